//! RPC client for one remote `ComputationService` endpoint.
//!
//! The coordinator holds one client per registered compute node; a compute
//! node holds one client for the coordinator (to register itself). The
//! [`ComputeClient`] trait exists so the coordinator can be tested against a
//! scripted double without a network.

use ::core::future::Future;
use ::std::collections::BTreeMap;
use ::std::time::Duration;

use ::anyhow::anyhow;
use ::tokio::time::timeout;
use ::tonic::transport::{Channel, Endpoint};
use ::tonic::Request;

use crate::computation_grpc::computation_service_client::ComputationServiceClient;
use crate::computation_grpc::{
    ComputationRequest, NodeStatusRequest, RegisterNodeRequest, TaskStatusRequest,
};
use crate::error::{OpalError, Result};
use crate::node::{NodeId, NodeInfo, NodeStatus};
use crate::task::{ComputationPhase, TaskId, TaskSpec};

/// Outcome of a `RegisterNode` call, as reported by the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterOutcome {
    pub accepted: bool,
    pub message: String,
}

/// Parsed reply of `SubmitComputation`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationReply {
    pub task_id: String,
    pub phase: ComputationPhase,
    pub result: Vec<u8>,
    pub error_message: String,
}

/// Parsed reply of `GetTaskStatus`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatusReply {
    pub task_id: String,
    pub phase: ComputationPhase,
    pub progress: f32,
}

/// Parsed reply of `GetNodeStatus`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatusReply {
    pub node_id: String,
    pub status: NodeStatus,
    pub active_tasks: u32,
    pub metrics: BTreeMap<String, String>,
}

/// Communication handle for a remote `ComputationService` endpoint.
///
/// Every call carries the timeout given at connect time; a timed-out call is
/// reported as an unreachable-node error and the remote's eventual outcome,
/// if any, is not reconciled.
pub trait ComputeClient: Clone + Sized + Send + Sync + 'static {
    /// Open a channel to the endpoint at `address` (host:port).
    fn connect(
        address: &str,
        rpc_timeout: Duration,
    ) -> impl Future<Output = Result<Self>> + Send;

    fn register_node(&self, info: &NodeInfo) -> impl Future<Output = Result<RegisterOutcome>> + Send;

    fn submit_computation(
        &self,
        task_id: &TaskId,
        spec: &TaskSpec,
    ) -> impl Future<Output = Result<ComputationReply>> + Send;

    fn get_task_status(
        &self,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<TaskStatusReply>> + Send;

    /// Must not block on computation in progress on the remote side.
    fn get_node_status(
        &self,
        node_id: &NodeId,
    ) -> impl Future<Output = Result<NodeStatusReply>> + Send;
}

/// [`ComputeClient`] backed by a tonic channel.
#[derive(Clone)]
pub struct GrpcComputeClient {
    client: ComputationServiceClient<Channel>,
    rpc_timeout: Duration,
}

/// Await `call` for at most `rpc_timeout`, flattening transport errors.
async fn rpc<T>(
    rpc_timeout: Duration,
    call: impl Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
) -> Result<T> {
    match timeout(rpc_timeout, call).await {
        Err(_) => Err(OpalError::unreachable_node(anyhow!(
            "RPC timed out after {:?}",
            rpc_timeout
        ))),
        Ok(Err(status)) => Err(OpalError::unreachable_node(anyhow!("RPC failed: {}", status))),
        Ok(Ok(response)) => Ok(response.into_inner()),
    }
}

impl ComputeClient for GrpcComputeClient {
    fn connect(
        address: &str,
        rpc_timeout: Duration,
    ) -> impl Future<Output = Result<Self>> + Send {
        let uri = format!("http://{}", address);
        async move {
            let endpoint = Endpoint::from_shared(uri)
                .map_err(OpalError::unreachable_node)?
                .connect_timeout(rpc_timeout)
                .timeout(rpc_timeout);
            let channel = endpoint
                .connect()
                .await
                .map_err(OpalError::unreachable_node)?;
            Ok(Self {
                client: ComputationServiceClient::new(channel),
                rpc_timeout,
            })
        }
    }

    fn register_node(&self, info: &NodeInfo) -> impl Future<Output = Result<RegisterOutcome>> + Send {
        let mut client = self.client.clone();
        let rpc_timeout = self.rpc_timeout;
        let request = RegisterNodeRequest {
            node_id: info.id.to_string(),
            address: info.address.clone(),
            capabilities: info
                .capabilities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        async move {
            let reply = rpc(rpc_timeout, client.register_node(Request::new(request))).await?;
            Ok(RegisterOutcome {
                accepted: reply.success,
                message: reply.message,
            })
        }
    }

    fn submit_computation(
        &self,
        task_id: &TaskId,
        spec: &TaskSpec,
    ) -> impl Future<Output = Result<ComputationReply>> + Send {
        let mut client = self.client.clone();
        let rpc_timeout = self.rpc_timeout;
        let request = ComputationRequest {
            task_id: task_id.to_string(),
            operation: spec.operation.to_string(),
            data_id: spec.data_id.clone(),
            params: spec
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            priority: spec.priority,
        };
        async move {
            let reply = rpc(
                rpc_timeout,
                client.submit_computation(Request::new(request)),
            )
            .await?;
            Ok(ComputationReply {
                task_id: reply.task_id,
                phase: reply.status.parse()?,
                result: reply.result,
                error_message: reply.error_message,
            })
        }
    }

    fn get_task_status(
        &self,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<TaskStatusReply>> + Send {
        let mut client = self.client.clone();
        let rpc_timeout = self.rpc_timeout;
        let request = TaskStatusRequest {
            task_id: task_id.to_string(),
        };
        async move {
            let reply = rpc(rpc_timeout, client.get_task_status(Request::new(request))).await?;
            Ok(TaskStatusReply {
                task_id: reply.task_id,
                phase: reply.status.parse()?,
                progress: reply.progress,
            })
        }
    }

    fn get_node_status(
        &self,
        node_id: &NodeId,
    ) -> impl Future<Output = Result<NodeStatusReply>> + Send {
        let mut client = self.client.clone();
        let rpc_timeout = self.rpc_timeout;
        let request = NodeStatusRequest {
            node_id: node_id.to_string(),
        };
        async move {
            let reply = rpc(rpc_timeout, client.get_node_status(Request::new(request))).await?;
            Ok(NodeStatusReply {
                node_id: reply.node_id,
                status: reply.status.parse()?,
                active_tasks: reply.active_tasks,
                metrics: reply.metrics.into_iter().collect(),
            })
        }
    }
}
