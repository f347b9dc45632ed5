//! The coordinator's gRPC surface and in-process entry points.

use ::std::sync::Arc;

use ::opal_common::{
    anyhow::anyhow,
    client::ComputeClient,
    computation_grpc::computation_service_server::ComputationService,
    computation_grpc::{
        ComputationRequest, ComputationResponse, NodeStatusRequest, NodeStatusResponse,
        RegisterNodeRequest, RegisterNodeResponse, TaskStatusRequest, TaskStatusResponse,
    },
    error::{OpalError, Result},
    node::{NodeId, NodeInfo, NodeRecord},
    task::{ComputationPhase, Operation, TaskId, TaskParams, TaskRecord, TaskSpec, TaskStatus},
};
use ::tonic::{Request, Response, Status};

use crate::{node_manager::NodeManager, task_manager::TaskManager};

/// Wires the node manager and task manager together. `submit` and `status`
/// are the narrow interface the API layer consumes; everything else is
/// plumbing for the gRPC service and the background loops.
pub struct Coordinator<C: ComputeClient> {
    node_manager: Arc<NodeManager<C>>,
    task_manager: Arc<TaskManager>,
}

impl<C: ComputeClient> Coordinator<C> {
    pub fn new(node_manager: Arc<NodeManager<C>>, task_manager: Arc<TaskManager>) -> Self {
        Self {
            node_manager,
            task_manager,
        }
    }

    /// Submit a unit of work; returns the generated task id. Enqueueing
    /// itself cannot fail once the arguments are validated.
    pub fn submit(
        &self,
        operation: Operation,
        data_id: String,
        params: TaskParams,
        priority: i32,
    ) -> Result<TaskId> {
        if data_id.is_empty() {
            return Err(OpalError::illegal_argument(anyhow!(
                "Missing payload reference"
            )));
        }
        Ok(self.task_manager.submit(TaskSpec {
            operation,
            data_id,
            params,
            priority,
        }))
    }

    /// Current snapshot of a task, or a not-found error for an id that was
    /// never issued.
    pub fn status(&self, id: &TaskId) -> Result<TaskRecord> {
        self.task_manager.status(id)
    }

    pub async fn register_node(&self, info: NodeInfo) -> Result<bool> {
        self.node_manager.register(info).await
    }

    pub fn node_status(&self, id: &NodeId) -> Result<NodeRecord> {
        self.node_manager
            .get_node(id)
            .ok_or_else(|| OpalError::node_not_found(id))
    }
}

/// Tonic service exposing the coordinator over the shared wire contract:
/// compute nodes call RegisterNode, the API layer calls SubmitComputation
/// and GetTaskStatus, and GetNodeStatus answers from the registry snapshot.
pub struct CoordinatorService<C: ComputeClient> {
    coordinator: Arc<Coordinator<C>>,
}

impl<C: ComputeClient> CoordinatorService<C> {
    pub fn new(coordinator: Arc<Coordinator<C>>) -> Self {
        Self { coordinator }
    }

    async fn try_register(&self, request: RegisterNodeRequest) -> Result<bool> {
        let info = NodeInfo {
            id: NodeId::try_from(request.node_id)?,
            address: request.address,
            capabilities: request
                .capabilities
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        };
        self.coordinator.register_node(info).await
    }
}

#[tonic::async_trait]
impl<C: ComputeClient> ComputationService for CoordinatorService<C> {
    async fn register_node(
        &self,
        request: Request<RegisterNodeRequest>,
    ) -> std::result::Result<Response<RegisterNodeResponse>, Status> {
        // Registration failures are answered in-band so the node sees the
        // reason, not a bare transport error.
        let reply = match self.try_register(request.into_inner()).await {
            Ok(true) => RegisterNodeResponse {
                success: true,
                message: "registration successful".to_owned(),
            },
            Ok(false) => RegisterNodeResponse {
                success: false,
                message: "node already registered".to_owned(),
            },
            Err(e) => RegisterNodeResponse {
                success: false,
                message: e.to_string(),
            },
        };
        Ok(Response::new(reply))
    }

    async fn submit_computation(
        &self,
        request: Request<ComputationRequest>,
    ) -> std::result::Result<Response<ComputationResponse>, Status> {
        let request = request.into_inner();
        // The operation string is validated exactly once, here at ingress.
        let operation: Operation = request.operation.parse()?;
        let task_id = self.coordinator.submit(
            operation,
            request.data_id,
            request.params.into_iter().collect(),
            request.priority,
        )?;
        Ok(Response::new(ComputationResponse {
            task_id: task_id.to_string(),
            status: ComputationPhase::Submitted.to_string(),
            result: vec![],
            error_message: String::new(),
        }))
    }

    async fn get_task_status(
        &self,
        request: Request<TaskStatusRequest>,
    ) -> std::result::Result<Response<TaskStatusResponse>, Status> {
        let task_id = TaskId::try_from(request.into_inner().task_id)?;
        let record = self.coordinator.status(&task_id)?;
        let progress = match record.status {
            TaskStatus::Pending => 0.0,
            TaskStatus::Active => 0.5,
            TaskStatus::Completed | TaskStatus::Failed => 1.0,
        };
        Ok(Response::new(TaskStatusResponse {
            task_id: task_id.to_string(),
            status: record.status.to_string(),
            progress,
        }))
    }

    async fn get_node_status(
        &self,
        request: Request<NodeStatusRequest>,
    ) -> std::result::Result<Response<NodeStatusResponse>, Status> {
        let node_id = NodeId::try_from(request.into_inner().node_id)?;
        let record = self.coordinator.node_status(&node_id)?;
        let metrics = [("last_seen".to_owned(), record.last_seen.to_string())]
            .into_iter()
            .collect();
        Ok(Response::new(NodeStatusResponse {
            node_id: node_id.to_string(),
            status: record.status.to_string(),
            active_tasks: record.active_tasks,
            metrics,
        }))
    }
}
