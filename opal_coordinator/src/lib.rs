//! The Opal coordinator: accepts computation requests, tracks a registry of
//! compute nodes, assigns units of encrypted work and records per-task
//! lifecycle state.

use ::opal_common::serde::Deserialize;

pub mod dispatch;
pub mod node_manager;
pub mod service;
pub mod task_manager;
pub(crate) mod task_queue;

/// Configuration for the Opal coordinator.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(crate = "opal_common::serde")]
pub struct CoordinatorConfig {
    /// host:port the coordinator's gRPC endpoint binds to.
    pub bind_address: String,
    /// System-wide ceiling on ACTIVE tasks.
    pub max_concurrent_tasks: usize,
    /// Per-node in-flight task limit.
    pub max_tasks_per_node: u32,
    /// A node with no successful probe for longer than this is marked
    /// DISCONNECTED.
    pub node_offline_threshold_secs: u64,
    pub health_sweep_interval_secs: u64,
    pub dispatch_poll_interval_millis: u64,
    /// Finished tasks are purged once they are older than this.
    pub task_retention_secs: u64,
    /// Timeout applied to every remote call.
    pub rpc_timeout_secs: u64,
}
