use ::core::fmt::Display;
use ::std::str::FromStr;

use ::anyhow::anyhow;

use crate::error::OpalError;

/// Execution phase of a computation as reported over the wire.
///
/// `submitted` is answered by the coordinator's ingress (its dispatch is
/// asynchronous); compute nodes execute synchronously and answer with a
/// terminal phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputationPhase {
    Submitted,
    Running,
    Completed,
    Failed,
}

impl Display for ComputationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ComputationPhase {
    type Err = OpalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(OpalError::illegal_argument(anyhow!(
                "Unknown computation phase: {}",
                other
            ))),
        }
    }
}
