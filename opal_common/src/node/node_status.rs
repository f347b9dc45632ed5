use ::core::fmt::Display;
use ::std::str::FromStr;

use ::anyhow::anyhow;
use ::serde::{Deserialize, Serialize};

use crate::error::OpalError;

/// Liveness of a compute node.
///
/// The coordinator's registry records `Connected`/`Disconnected` from its
/// own observations; `Idle`/`Busy` are what a node reports about itself in
/// a `GetNodeStatus` reply. Only `Connected` nodes are dispatch candidates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    Connected,
    Disconnected,
    Busy,
    Idle,
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "CONNECTED"),
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Busy => write!(f, "BUSY"),
            Self::Idle => write!(f, "IDLE"),
        }
    }
}

impl FromStr for NodeStatus {
    type Err = OpalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTED" => Ok(Self::Connected),
            "DISCONNECTED" => Ok(Self::Disconnected),
            "BUSY" => Ok(Self::Busy),
            "IDLE" => Ok(Self::Idle),
            other => Err(OpalError::illegal_argument(anyhow!(
                "Unknown node status: {}",
                other
            ))),
        }
    }
}
