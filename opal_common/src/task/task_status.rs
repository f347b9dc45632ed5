use ::core::fmt::Display;

use ::serde::{Deserialize, Serialize};

/// Lifecycle states of a task as seen by the coordinator.
///
/// Transitions are monotonic: `Pending` -> `Active` -> `Completed` or
/// `Failed`. Terminal states are final; a task is never dequeued twice.
/// The one internal exception is the dispatch loop returning an `Active`
/// task to `Pending` when no node is available, preserving its original
/// ordering key.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}
