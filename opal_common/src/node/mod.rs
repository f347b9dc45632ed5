use ::serde::{Deserialize, Serialize};
use ::std::{borrow::Cow, collections::BTreeMap};

mod node_id;
mod node_status;

pub use node_id::NodeId;
pub use node_status::NodeStatus;

use crate::timestamp::Timestamp;

/// Advertised capabilities of a compute node. Informational only, the
/// coordinator never interprets the values.
pub type NodeCapabilities = BTreeMap<Cow<'static, str>, Cow<'static, str>>;

/// Identity of a compute node as announced at registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeInfo {
    pub id: NodeId,
    /// host:port of the node's ComputationService endpoint.
    pub address: String,
    pub capabilities: NodeCapabilities,
}

/// Registry entry for one compute node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub info: NodeInfo,
    pub status: NodeStatus,
    /// In-flight task count. Overwritten by the node's own count on every
    /// successful probe; the remote is ground truth for its own load.
    pub active_tasks: u32,
    /// Updated on every successful probe.
    pub last_seen: Timestamp,
}

impl NodeRecord {
    /// Fresh registry entry for a node that just registered.
    pub fn connected(info: NodeInfo) -> Self {
        Self {
            info,
            status: NodeStatus::Connected,
            active_tasks: 0,
            last_seen: Timestamp::now(),
        }
    }
}
