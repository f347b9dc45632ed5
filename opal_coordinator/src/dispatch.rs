//! The coordinator's dispatch loop and periodic health sweep.

use ::std::sync::Arc;
use ::std::time::Duration;

use ::opal_common::{
    client::ComputeClient,
    error::Result,
    node::NodeId,
    task::{ComputationPhase, TaskRecord},
    tokio,
    tracing::{debug, info, warn},
};

use crate::{node_manager::NodeManager, task_manager::TaskManager};

/// Pulls tasks off the queue and sends each to the first available node.
pub struct Dispatcher<C: ComputeClient> {
    node_manager: Arc<NodeManager<C>>,
    task_manager: Arc<TaskManager>,
    poll_interval: Duration,
}

impl<C: ComputeClient> Dispatcher<C> {
    pub fn new(
        node_manager: Arc<NodeManager<C>>,
        task_manager: Arc<TaskManager>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            node_manager,
            task_manager,
            poll_interval,
        }
    }

    /// Run forever, sleeping for the poll interval whenever there is
    /// nothing to dispatch (queue empty, admission ceiling reached, or no
    /// node available).
    pub async fn run(self) -> ! {
        loop {
            if !self.dispatch_once().await {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    /// One dispatch step: dequeue, pick a node, send, record the outcome.
    /// Returns whether a task was sent to a node.
    pub async fn dispatch_once(&self) -> bool {
        let Some(task) = self.task_manager.dequeue_next() else {
            return false;
        };
        // The task->node association lives only in these locals; it is
        // derived from the dispatching client, never stored on the task.
        let Some(node_id) = self
            .node_manager
            .list_available()
            .into_iter()
            .find(|id| self.node_manager.reserve(id))
        else {
            // A dequeued task is never lost: back to its place in line.
            if let Err(e) = self.task_manager.requeue(&task.id) {
                warn!("Failed to requeue task {}: {}", task.id, e);
            }
            return false;
        };
        let outcome = self.send(&task, &node_id).await;
        self.node_manager.release(&node_id);
        if let Err(e) = outcome {
            warn!("Recording outcome of task {} failed: {}", task.id, e);
        }
        true
    }

    async fn send(&self, task: &TaskRecord, node_id: &NodeId) -> Result<()> {
        let Some(client) = self.node_manager.client(node_id) else {
            return self.task_manager.fail(
                &task.id,
                format!("node {} disappeared before dispatch", node_id),
            );
        };
        debug!("Dispatching task {} to node {}", task.id, node_id);
        match client.submit_computation(&task.id, &task.spec).await {
            Ok(reply) => match reply.phase {
                ComputationPhase::Completed => {
                    info!("Task {} completed on node {}", task.id, node_id);
                    self.task_manager.complete(&task.id, reply.result)
                }
                ComputationPhase::Failed => {
                    let error = if reply.error_message.is_empty() {
                        "computation failed".to_owned()
                    } else {
                        reply.error_message
                    };
                    self.task_manager.fail(&task.id, error)
                }
                phase @ (ComputationPhase::Submitted | ComputationPhase::Running) => {
                    // Nodes execute synchronously; a non-terminal answer is
                    // a protocol violation.
                    self.task_manager.fail(
                        &task.id,
                        format!("node {} answered with non-terminal phase {}", node_id, phase),
                    )
                }
            },
            // Transport failures and timeouts both land here; a late result
            // from the node is not reconciled (at-most-once to the caller).
            Err(e) => self.task_manager.fail(&task.id, e.to_string()),
        }
    }
}

/// Periodically reconcile node liveness and authoritative load counters.
pub async fn run_health_sweep<C: ComputeClient>(
    node_manager: Arc<NodeManager<C>>,
    sweep_interval: Duration,
    offline_threshold: Duration,
) -> ! {
    loop {
        tokio::time::sleep(sweep_interval).await;
        node_manager.health_sweep(offline_threshold).await;
    }
}

/// Periodically drop finished tasks older than the retention window, so the
/// task table does not grow without bound.
pub async fn run_task_purge(task_manager: Arc<TaskManager>, retention: Duration) -> ! {
    loop {
        tokio::time::sleep(retention).await;
        task_manager.purge_older_than(retention);
    }
}
