use ::core::future::Future;
use ::std::collections::BTreeMap;
use ::std::sync::atomic::{AtomicU32, Ordering};
use ::std::sync::Arc;
use ::std::time::Duration;

use ::opal_common::{
    anyhow::anyhow,
    client::{
        ComputationReply, ComputeClient, NodeStatusReply, RegisterOutcome, TaskStatusReply,
    },
    error::{OpalError, Result},
    node::{NodeCapabilities, NodeId, NodeInfo, NodeStatus},
    task::{ComputationPhase, TaskId, TaskSpec},
};

/// Scripted stand-in for a remote compute node, playing the role MockDB
/// plays for the database in other services' tests. Behavior is keyed on
/// the address the client was connected to:
/// - `refuse:...`     : connect fails
/// - `reject:...`     : SubmitComputation answers `failed`
/// - `probe-fail:...` : GetNodeStatus fails
/// - `busy:...`       : GetNodeStatus reports BUSY
/// - anything else    : every call succeeds
#[derive(Clone)]
pub struct FakeClient {
    address: String,
    pub submissions: Arc<AtomicU32>,
}

impl ComputeClient for FakeClient {
    fn connect(address: &str, _rpc_timeout: Duration) -> impl Future<Output = Result<Self>> + Send {
        let address = address.to_owned();
        async move {
            if address.starts_with("refuse:") {
                Err(OpalError::unreachable_node(anyhow!(
                    "connection refused: {}",
                    address
                )))
            } else {
                Ok(Self {
                    address,
                    submissions: Arc::new(AtomicU32::new(0)),
                })
            }
        }
    }

    fn register_node(&self, _info: &NodeInfo) -> impl Future<Output = Result<RegisterOutcome>> + Send {
        async move {
            Ok(RegisterOutcome {
                accepted: true,
                message: "registration successful".to_owned(),
            })
        }
    }

    fn submit_computation(
        &self,
        task_id: &TaskId,
        spec: &TaskSpec,
    ) -> impl Future<Output = Result<ComputationReply>> + Send {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let reject = self.address.starts_with("reject:");
        let task_id = task_id.to_string();
        let operation = spec.operation;
        async move {
            if reject {
                Ok(ComputationReply {
                    task_id,
                    phase: ComputationPhase::Failed,
                    result: vec![],
                    error_message: format!("node does not support operation {}", operation),
                })
            } else {
                Ok(ComputationReply {
                    task_id,
                    phase: ComputationPhase::Completed,
                    result: vec![42],
                    error_message: String::new(),
                })
            }
        }
    }

    fn get_task_status(
        &self,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<TaskStatusReply>> + Send {
        let task_id = task_id.to_string();
        async move {
            Ok(TaskStatusReply {
                task_id,
                phase: ComputationPhase::Completed,
                progress: 1.0,
            })
        }
    }

    fn get_node_status(
        &self,
        node_id: &NodeId,
    ) -> impl Future<Output = Result<NodeStatusReply>> + Send {
        let address = self.address.clone();
        let node_id = node_id.to_string();
        async move {
            if address.starts_with("probe-fail:") {
                Err(OpalError::unreachable_node(anyhow!(
                    "probe failed: {}",
                    address
                )))
            } else {
                Ok(NodeStatusReply {
                    node_id,
                    status: if address.starts_with("busy:") {
                        NodeStatus::Busy
                    } else {
                        NodeStatus::Idle
                    },
                    active_tasks: 0,
                    metrics: BTreeMap::new(),
                })
            }
        }
    }
}

/// Registration request for a node living at `address`.
pub fn node_info(id: &'static str, address: &str) -> NodeInfo {
    NodeInfo {
        id: NodeId::try_from(id).unwrap(),
        address: address.to_owned(),
        capabilities: NodeCapabilities::new(),
    }
}
