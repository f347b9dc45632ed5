//! Priority-ordered pending tasks.

use ::std::cmp::{Ordering, Reverse};
use ::std::collections::BinaryHeap;

use ::opal_common::task::TaskId;

/// Ordering key of a queued task: priority first (lower is served first),
/// submission sequence second. Ties within a priority band are FIFO, so
/// equal-priority tasks cannot starve each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueuedTask {
    pub priority: i32,
    pub sequence: u64,
    pub task_id: TaskId,
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending tasks. Sequence numbers are handed out here and
/// never reused, so a requeued task keeps its original place in line.
pub(crate) struct TaskQueue {
    heap: BinaryHeap<Reverse<QueuedTask>>,
    next_sequence: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Enqueue with a fresh sequence number; returns the assigned sequence.
    pub fn push(&mut self, task_id: TaskId, priority: i32) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(QueuedTask {
            priority,
            sequence,
            task_id,
        }));
        sequence
    }

    /// Re-enqueue with an ordering key assigned earlier.
    pub fn push_with_sequence(&mut self, task_id: TaskId, priority: i32, sequence: u64) {
        self.heap.push(Reverse(QueuedTask {
            priority,
            sequence,
            task_id,
        }));
    }

    pub fn pop(&mut self) -> Option<QueuedTask> {
        self.heap.pop().map(|Reverse(task)| task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
