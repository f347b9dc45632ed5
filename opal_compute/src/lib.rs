//! The Opal compute node: accepts dispatched units of encrypted work,
//! executes them through the computation engine and reports results back.

use ::opal_common::{node::NodeCapabilities, serde::Deserialize};

pub mod engine;
pub mod service;
pub mod storage;

/// Configuration for an Opal compute node.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(crate = "opal_common::serde")]
pub struct ComputeNodeConfig {
    /// Identifier announced to the coordinator; must be unique in the pool.
    pub node_id: String,
    /// host:port to bind the gRPC endpoint on.
    pub bind_address: String,
    /// host:port the coordinator dials back; bind_address with a routable
    /// host.
    pub advertise_address: String,
    /// host:port of the coordinator's gRPC endpoint.
    pub coordinator_address: String,
    /// Upper bound on concurrently executing computations.
    pub max_workers: usize,
    /// Timeout applied to every remote call.
    pub rpc_timeout_secs: u64,
    #[serde(default)]
    pub capabilities: NodeCapabilities,
}
