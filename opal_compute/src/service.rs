//! The compute node's `ComputationService` implementation.

use ::std::collections::HashMap;
use ::std::sync::atomic::{AtomicU64, Ordering};
use ::std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::opal_common::{
    anyhow::anyhow,
    computation_grpc::computation_service_server::ComputationService,
    computation_grpc::{
        ComputationRequest, ComputationResponse, NodeStatusRequest, NodeStatusResponse,
        RegisterNodeRequest, RegisterNodeResponse, TaskStatusRequest, TaskStatusResponse,
    },
    error::{OpalError, Result},
    node::{NodeId, NodeStatus},
    task::{ComputationPhase, Operation, TaskId, TaskParams},
    tokio::{sync::Semaphore, task::spawn_blocking},
    tracing::{info, warn},
};
use ::tonic::{Request, Response, Status};

use crate::{engine::ComputationEngine, storage::DataStore};

/// Remote endpoint executing dispatched units of work.
///
/// Execution is synchronous: the `SubmitComputation` reply carries the
/// terminal phase and the result or error. A bounded pool of engine slots
/// caps concurrent computations at `max_workers`; status RPCs answer from
/// counters and never wait on a slot.
pub struct ComputeNodeService<E, S> {
    node_id: NodeId,
    engine: Arc<E>,
    storage: Arc<S>,
    /// Every task this node has seen, so status polls observe terminal
    /// phases. Diagnostic only; the coordinator's table is the system of
    /// record.
    tasks: Mutex<HashMap<TaskId, ComputationPhase>>,
    engine_slots: Arc<Semaphore>,
    max_workers: usize,
    completed_total: AtomicU64,
    failed_total: AtomicU64,
}

impl<E: ComputationEngine, S: DataStore> ComputeNodeService<E, S> {
    pub fn new(node_id: NodeId, engine: E, storage: S, max_workers: usize) -> Self {
        Self {
            node_id,
            engine: Arc::new(engine),
            storage: Arc::new(storage),
            tasks: Mutex::new(HashMap::new()),
            engine_slots: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            completed_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, ComputationPhase>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_phase(&self, id: &TaskId, phase: ComputationPhase) {
        self.tasks().insert(id.clone(), phase);
    }

    /// Fetch the payload and run the engine under a worker slot. Any error
    /// here is the task's failure, never the process's.
    async fn execute(
        &self,
        operation: Operation,
        data_id: &str,
        params: TaskParams,
    ) -> Result<Vec<u8>> {
        let _slot = self
            .engine_slots
            .acquire()
            .await
            .map_err(OpalError::engine_failure)?;
        let (payload, _metadata) = self.storage.retrieve(data_id).await?;
        let engine = Arc::clone(&self.engine);
        // The engine may grind for a while; keep it off the RPC threads. A
        // panicking engine surfaces as a failed task here.
        spawn_blocking(move || engine.compute(&payload, operation, &params))
            .await
            .map_err(|e| OpalError::engine_failure(anyhow!("Computation aborted: {}", e)))?
    }
}

#[tonic::async_trait]
impl<E: ComputationEngine, S: DataStore> ComputationService for ComputeNodeService<E, S> {
    async fn register_node(
        &self,
        _request: Request<RegisterNodeRequest>,
    ) -> std::result::Result<Response<RegisterNodeResponse>, Status> {
        Err(Status::unimplemented(
            "nodes register with the coordinator",
        ))
    }

    async fn submit_computation(
        &self,
        request: Request<ComputationRequest>,
    ) -> std::result::Result<Response<ComputationResponse>, Status> {
        let request = request.into_inner();
        // Validate before any work: an invalid request must not execute,
        // even partially. Rejections are answered in-band so the
        // coordinator can preserve the error text on the task.
        let validated = TaskId::try_from(request.task_id.clone())
            .and_then(|task_id| Ok((task_id, request.operation.parse::<Operation>()?)))
            .and_then(|parsed| {
                if request.data_id.is_empty() {
                    Err(OpalError::illegal_argument(anyhow!(
                        "Missing payload reference"
                    )))
                } else {
                    Ok(parsed)
                }
            });
        let (task_id, operation) = match validated {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Rejecting computation request: {}", e);
                return Ok(Response::new(ComputationResponse {
                    task_id: request.task_id,
                    status: ComputationPhase::Failed.to_string(),
                    result: vec![],
                    error_message: e.to_string(),
                }));
            }
        };

        self.record_phase(&task_id, ComputationPhase::Running);
        let params: TaskParams = request.params.into_iter().collect();
        let reply = match self.execute(operation, &request.data_id, params).await {
            Ok(result) => {
                self.record_phase(&task_id, ComputationPhase::Completed);
                self.completed_total.fetch_add(1, Ordering::Relaxed);
                info!("Task {} completed ({})", task_id, operation);
                ComputationResponse {
                    task_id: task_id.to_string(),
                    status: ComputationPhase::Completed.to_string(),
                    result,
                    error_message: String::new(),
                }
            }
            Err(e) => {
                self.record_phase(&task_id, ComputationPhase::Failed);
                self.failed_total.fetch_add(1, Ordering::Relaxed);
                warn!("Task {} failed: {}", task_id, e);
                ComputationResponse {
                    task_id: task_id.to_string(),
                    status: ComputationPhase::Failed.to_string(),
                    result: vec![],
                    error_message: e.to_string(),
                }
            }
        };
        Ok(Response::new(reply))
    }

    async fn get_task_status(
        &self,
        request: Request<TaskStatusRequest>,
    ) -> std::result::Result<Response<TaskStatusResponse>, Status> {
        let task_id = TaskId::try_from(request.into_inner().task_id)?;
        // A task this node never saw is an error, not fabricated progress.
        let phase = self
            .tasks()
            .get(&task_id)
            .copied()
            .ok_or_else(|| OpalError::task_not_found(&task_id))?;
        let progress = match phase {
            ComputationPhase::Completed | ComputationPhase::Failed => 1.0,
            ComputationPhase::Submitted | ComputationPhase::Running => 0.0,
        };
        Ok(Response::new(TaskStatusResponse {
            task_id: task_id.to_string(),
            status: phase.to_string(),
            progress,
        }))
    }

    async fn get_node_status(
        &self,
        _request: Request<NodeStatusRequest>,
    ) -> std::result::Result<Response<NodeStatusResponse>, Status> {
        // Answered from counters only; a computation in progress never
        // delays this.
        let active = (self.max_workers - self.engine_slots.available_permits()) as u32;
        let status = if active as usize >= self.max_workers {
            NodeStatus::Busy
        } else {
            NodeStatus::Idle
        };
        let metrics = HashMap::from([
            (
                "completed_total".to_owned(),
                self.completed_total.load(Ordering::Relaxed).to_string(),
            ),
            (
                "failed_total".to_owned(),
                self.failed_total.load(Ordering::Relaxed).to_string(),
            ),
            ("max_workers".to_owned(), self.max_workers.to_string()),
        ]);
        Ok(Response::new(NodeStatusResponse {
            node_id: self.node_id.to_string(),
            status: status.to_string(),
            active_tasks: active,
            metrics,
        }))
    }
}
