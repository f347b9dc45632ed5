use ::serde::{Deserialize, Serialize};
use ::std::collections::BTreeMap;

mod computation_phase;
mod operation;
mod task_id;
mod task_status;

pub use computation_phase::ComputationPhase;
pub use operation::Operation;
pub use task_id::TaskId;
pub use task_status::TaskStatus;

use crate::timestamp::Timestamp;

/// Operation-specific parameters. Values are opaque bytes; the computation
/// engine decides how to interpret them.
pub type TaskParams = BTreeMap<String, Vec<u8>>;

/// What to compute: the immutable part of a task, fixed at submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    pub operation: Operation,
    /// Opaque reference to the encrypted payload.
    pub data_id: String,
    pub params: TaskParams,
    /// Lower values are served first.
    pub priority: i32,
}

/// Full lifecycle record of a task, owned by the coordinator's task manager
/// for the task's whole lifetime. `result` and `error` are never both
/// populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub status: TaskStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl TaskRecord {
    /// Fresh record for a just-submitted task.
    pub fn pending(id: TaskId, spec: TaskSpec) -> Self {
        Self {
            id,
            spec,
            status: TaskStatus::Pending,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn mark_active(&mut self) {
        self.status = TaskStatus::Active;
        self.started_at = Some(Timestamp::now());
    }

    /// Return an `Active` task to the queue-visible state. Only the dispatch
    /// loop uses this, when no node is available for a dequeued task.
    pub fn mark_pending(&mut self) {
        self.status = TaskStatus::Pending;
        self.started_at = None;
    }

    pub fn mark_completed(&mut self, result: Vec<u8>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Timestamp::now());
        self.result = Some(result);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Timestamp::now());
        self.error = Some(error);
    }
}
