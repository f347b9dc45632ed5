use ::mockall::mock;
use ::opal_common::{
    anyhow::anyhow,
    computation_grpc::computation_service_server::ComputationService,
    computation_grpc::{ComputationRequest, NodeStatusRequest, RegisterNodeRequest, TaskStatusRequest},
    error::{OpalError, Result},
    node::NodeId,
    task::{Operation, TaskParams},
    tokio,
};
use ::opal_compute::{
    engine::{ClearTextEngine, ComputationEngine},
    service::ComputeNodeService,
    storage::{DataMetadata, DataStore, MemoryStore},
};
use ::tonic::{Code, Request};

mock! {
    pub Engine {}
    impl ComputationEngine for Engine {
        fn encrypt(&self, plaintext: &[f64]) -> Result<Vec<u8>>;
        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<f64>>;
        fn compute(
            &self,
            ciphertext: &[u8],
            operation: Operation,
            params: &TaskParams,
        ) -> Result<Vec<u8>>;
    }
}

mock! {
    pub Store {}
    impl DataStore for Store {
        async fn store(&self, bytes: Vec<u8>, metadata: DataMetadata) -> Result<String>;
        async fn retrieve(&self, id: &str) -> Result<(Vec<u8>, DataMetadata)>;
    }
}

fn node_id() -> NodeId {
    NodeId::try_from("n1").unwrap()
}

/// Service over the cleartext engine with `payload` preloaded; returns the
/// service and the payload's data id.
async fn service_with_payload(
    payload: &[f64],
) -> Result<(ComputeNodeService<ClearTextEngine, MemoryStore>, String)> {
    let engine = ClearTextEngine;
    let storage = MemoryStore::new();
    let data_id = storage
        .store(engine.encrypt(payload)?, DataMetadata::new())
        .await?;
    Ok((ComputeNodeService::new(node_id(), engine, storage, 4), data_id))
}

fn computation_request(task_id: &str, operation: &str, data_id: &str) -> Request<ComputationRequest> {
    Request::new(ComputationRequest {
        task_id: task_id.to_owned(),
        operation: operation.to_owned(),
        data_id: data_id.to_owned(),
        params: Default::default(),
        priority: 0,
    })
}

#[tokio::test]
async fn mean_computation_completes_with_a_result() -> Result<()> {
    let (service, data_id) = service_with_payload(&[1.0, 2.0, 3.0, 4.0]).await?;

    let reply = service
        .submit_computation(computation_request("t1", "mean", &data_id))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.status, "completed");
    assert_eq!(reply.error_message, "");
    assert_eq!(ClearTextEngine.decrypt(&reply.result)?, vec![2.5]);
    Ok(())
}

#[tokio::test]
async fn unknown_operation_is_rejected_before_any_work() -> Result<()> {
    let (service, data_id) = service_with_payload(&[1.0]).await?;

    let reply = service
        .submit_computation(computation_request("t1", "unsupported_xyz", &data_id))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.status, "failed");
    assert!(reply.error_message.contains("Unsupported operation"));
    assert!(reply.result.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_payload_reference_is_rejected() -> Result<()> {
    let (service, _) = service_with_payload(&[1.0]).await?;

    let reply = service
        .submit_computation(computation_request("t1", "sum", ""))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.status, "failed");
    assert!(reply.error_message.contains("Missing payload reference"));
    Ok(())
}

#[tokio::test]
async fn unknown_data_id_fails_the_task() -> Result<()> {
    let service = ComputeNodeService::new(node_id(), ClearTextEngine, MemoryStore::new(), 4);

    let reply = service
        .submit_computation(computation_request("t1", "sum", "no-such-data"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.status, "failed");
    assert!(reply.error_message.contains("not found"));
    Ok(())
}

#[tokio::test]
async fn engine_failure_becomes_a_failed_task_not_a_crash() -> Result<()> {
    let mut engine = MockEngine::new();
    engine
        .expect_compute()
        .times(1)
        .returning(|_, _, _| Err(OpalError::engine_failure(anyhow!("modulus exhausted"))));
    let storage = MemoryStore::new();
    let data_id = storage.store(vec![0u8; 8], DataMetadata::new()).await?;
    let service = ComputeNodeService::new(node_id(), engine, storage, 4);

    let reply = service
        .submit_computation(computation_request("t1", "multiply", &data_id))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.status, "failed");
    assert!(reply.error_message.contains("modulus exhausted"));

    let status = service
        .get_node_status(Request::new(NodeStatusRequest {
            node_id: "n1".to_owned(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.metrics.get("failed_total").map(String::as_str), Some("1"));
    Ok(())
}

#[tokio::test]
async fn data_store_failure_fails_the_task() -> Result<()> {
    let mut storage = MockStore::new();
    storage
        .expect_retrieve()
        .times(1)
        .returning(|_| Err(OpalError::data_store_failure(anyhow!("volume detached"))));
    let service = ComputeNodeService::new(node_id(), ClearTextEngine, storage, 4);

    let reply = service
        .submit_computation(computation_request("t1", "sum", "d1"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.status, "failed");
    assert!(reply.error_message.contains("volume detached"));
    Ok(())
}

#[tokio::test]
async fn task_status_observes_the_terminal_phase() -> Result<()> {
    let (service, data_id) = service_with_payload(&[2.0, 4.0]).await?;
    service
        .submit_computation(computation_request("t1", "mean", &data_id))
        .await
        .unwrap();

    let status = service
        .get_task_status(Request::new(TaskStatusRequest {
            task_id: "t1".to_owned(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.status, "completed");
    assert_eq!(status.progress, 1.0);
    Ok(())
}

#[tokio::test]
async fn status_of_an_unknown_task_is_an_error() -> Result<()> {
    let (service, _) = service_with_payload(&[1.0]).await?;

    let status = service
        .get_task_status(Request::new(TaskStatusRequest {
            task_id: "never-submitted".to_owned(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    Ok(())
}

#[tokio::test]
async fn node_status_reports_idle_and_counters() -> Result<()> {
    let (service, data_id) = service_with_payload(&[1.0, 3.0]).await?;
    service
        .submit_computation(computation_request("t1", "sum", &data_id))
        .await
        .unwrap();

    let status = service
        .get_node_status(Request::new(NodeStatusRequest {
            node_id: "n1".to_owned(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.node_id, "n1");
    assert_eq!(status.status, "IDLE");
    assert_eq!(status.active_tasks, 0);
    assert_eq!(
        status.metrics.get("completed_total").map(String::as_str),
        Some("1")
    );
    Ok(())
}

#[tokio::test]
async fn registration_is_not_served_by_compute_nodes() -> Result<()> {
    let (service, _) = service_with_payload(&[1.0]).await?;

    let status = service
        .register_node(Request::new(RegisterNodeRequest {
            node_id: "n2".to_owned(),
            address: "10.0.0.2:50052".to_owned(),
            capabilities: Default::default(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
    Ok(())
}
