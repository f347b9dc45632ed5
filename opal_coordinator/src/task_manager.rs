//! Task lifecycle bookkeeping and admission control.

use ::std::collections::HashMap;
use ::std::sync::{Mutex, MutexGuard, PoisonError};
use ::std::time::Duration;

use ::opal_common::{
    anyhow::anyhow,
    error::{OpalError, Result},
    task::{TaskId, TaskRecord, TaskSpec, TaskStatus},
    tracing::{debug, info, warn},
};

use crate::task_queue::TaskQueue;

/// A task record plus the ordering key it was queued with. The key is kept
/// so a requeued task goes back to its original place in line.
struct TrackedTask {
    record: TaskRecord,
    sequence: u64,
}

struct TaskTable {
    queue: TaskQueue,
    tasks: HashMap<TaskId, TrackedTask>,
    /// Number of tasks in ACTIVE state, bounded by the admission ceiling.
    active: usize,
}

/// Exclusively owns every task record for its full lifetime.
pub struct TaskManager {
    table: Mutex<TaskTable>,
    max_concurrent_tasks: usize,
}

impl TaskManager {
    pub fn new(max_concurrent_tasks: usize) -> Self {
        Self {
            table: Mutex::new(TaskTable {
                queue: TaskQueue::new(),
                tasks: HashMap::new(),
                active: 0,
            }),
            max_concurrent_tasks,
        }
    }

    fn table(&self) -> MutexGuard<'_, TaskTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a new task with a fresh id. Always succeeds.
    pub fn submit(&self, spec: TaskSpec) -> TaskId {
        let id = TaskId::fresh();
        let mut table = self.table();
        let sequence = table.queue.push(id.clone(), spec.priority);
        table.tasks.insert(
            id.clone(),
            TrackedTask {
                record: TaskRecord::pending(id.clone(), spec),
                sequence,
            },
        );
        info!("Task {} submitted", id);
        id
    }

    /// Next task to dispatch, marked ACTIVE, or `None` when the queue is
    /// empty or the number of ACTIVE tasks has reached the ceiling. This is
    /// the backpressure point: queue depth never grows the in-flight set.
    pub fn dequeue_next(&self) -> Option<TaskRecord> {
        let mut table = self.table();
        if table.active >= self.max_concurrent_tasks {
            debug!(
                "Admission ceiling of {} active tasks reached",
                self.max_concurrent_tasks
            );
            return None;
        }
        let queued = table.queue.pop()?;
        let Some(tracked) = table.tasks.get_mut(&queued.task_id) else {
            // Every queue entry has a backing record; a miss is a bug.
            warn!("Queued task {} has no record", queued.task_id);
            return None;
        };
        tracked.record.mark_active();
        let record = tracked.record.clone();
        table.active += 1;
        Some(record)
    }

    /// Return a dequeued task to the queue under its original ordering key.
    /// Used by the dispatch loop when no node is available, so a task it
    /// already pulled is never lost.
    pub fn requeue(&self, id: &TaskId) -> Result<()> {
        let mut table = self.table();
        let tracked = table
            .tasks
            .get_mut(id)
            .ok_or_else(|| OpalError::task_not_found(id))?;
        if tracked.record.status != TaskStatus::Active {
            return Err(OpalError::not_allowed(anyhow!(
                "Task {} is not active, cannot be requeued",
                id
            )));
        }
        tracked.record.mark_pending();
        let priority = tracked.record.spec.priority;
        let sequence = tracked.sequence;
        table.queue.push_with_sequence(id.clone(), priority, sequence);
        table.active -= 1;
        debug!("Task {} requeued, no node available", id);
        Ok(())
    }

    /// Record a successful completion.
    pub fn complete(&self, id: &TaskId, result: Vec<u8>) -> Result<()> {
        self.finish(id, |record| record.mark_completed(result))?;
        info!("Task {} completed", id);
        Ok(())
    }

    /// Record a failure with the error text preserved.
    pub fn fail(&self, id: &TaskId, error: String) -> Result<()> {
        warn!("Task {} failed: {}", id, error);
        self.finish(id, |record| record.mark_failed(error))
    }

    /// Move an ACTIVE task to a terminal state. Unknown ids and tasks that
    /// are already terminal are reported as errors to the caller; the
    /// stored outcome is never altered.
    fn finish(&self, id: &TaskId, apply: impl FnOnce(&mut TaskRecord)) -> Result<()> {
        let mut table = self.table();
        let tracked = table
            .tasks
            .get_mut(id)
            .ok_or_else(|| OpalError::task_not_found(id))?;
        match tracked.record.status {
            TaskStatus::Active => apply(&mut tracked.record),
            TaskStatus::Pending => {
                return Err(OpalError::not_allowed(anyhow!(
                    "Task {} has not been dispatched",
                    id
                )))
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                return Err(OpalError::not_allowed(anyhow!(
                    "Task {} is already terminal",
                    id
                )))
            }
        }
        table.active -= 1;
        Ok(())
    }

    /// Current snapshot of a task.
    ///
    /// # Return
    /// - `Ok(record)` if the id was ever issued.
    /// - A not-found error otherwise.
    pub fn status(&self, id: &TaskId) -> Result<TaskRecord> {
        self.table()
            .tasks
            .get(id)
            .map(|tracked| tracked.record.clone())
            .ok_or_else(|| OpalError::task_not_found(id))
    }

    /// Drop finished tasks whose completion predates the cutoff, bounding
    /// memory growth. PENDING and ACTIVE tasks are never purged. Returns
    /// the number of removed records.
    pub fn purge_older_than(&self, age: Duration) -> usize {
        let mut table = self.table();
        let before = table.tasks.len();
        table.tasks.retain(|_, tracked| {
            match (&tracked.record.status, &tracked.record.completed_at) {
                (status, Some(completed_at)) if status.is_terminal() => {
                    completed_at.elapsed() <= age
                }
                _ => true,
            }
        });
        let purged = before - table.tasks.len();
        if purged > 0 {
            info!("Purged {} finished tasks", purged);
        }
        purged
    }

    pub fn active_count(&self) -> usize {
        self.table().active
    }

    pub fn pending_count(&self) -> usize {
        self.table().queue.len()
    }
}
