//! Round trips over a real tonic channel, exercising the client wrapper the
//! coordinator uses against an in-process compute node.

use ::std::net::SocketAddr;
use ::std::time::Duration;

use ::opal_common::{
    anyhow::anyhow,
    client::{ComputeClient, GrpcComputeClient},
    computation_grpc::computation_service_server::ComputationServiceServer,
    error::{OpalError, Result},
    node::{NodeId, NodeStatus},
    task::{ComputationPhase, Operation, TaskId, TaskParams, TaskSpec},
    tokio::{self, net::TcpListener},
};
use ::opal_compute::{
    engine::{ClearTextEngine, ComputationEngine},
    service::ComputeNodeService,
    storage::{DataMetadata, DataStore, MemoryStore},
};
use ::tonic::transport::{server::TcpIncoming, Server};

/// Serve a compute node on an ephemeral port with `payload` preloaded.
async fn spawn_node(payload: &[f64]) -> Result<(SocketAddr, String)> {
    let engine = ClearTextEngine;
    let storage = MemoryStore::new();
    let data_id = storage
        .store(engine.encrypt(payload)?, DataMetadata::new())
        .await?;
    let service = ComputeNodeService::new(NodeId::try_from("n1")?, engine, storage, 2);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(OpalError::fail_to_start_compute_node)?;
    let addr = listener
        .local_addr()
        .map_err(OpalError::fail_to_start_compute_node)?;
    let incoming = TcpIncoming::from_listener(listener, false, None)
        .map_err(|e| OpalError::fail_to_start_compute_node(anyhow!("{}", e)))?;
    tokio::spawn(
        Server::builder()
            .add_service(ComputationServiceServer::new(service))
            .serve_with_incoming(incoming),
    );
    Ok((addr, data_id))
}

#[tokio::test]
async fn computation_round_trip_over_grpc() -> Result<()> {
    let (addr, data_id) = spawn_node(&[1.0, 2.0, 3.0]).await?;
    let client = GrpcComputeClient::connect(&addr.to_string(), Duration::from_secs(5)).await?;

    let task_id = TaskId::try_from("t1")?;
    let reply = client
        .submit_computation(
            &task_id,
            &TaskSpec {
                operation: Operation::Sum,
                data_id,
                params: TaskParams::new(),
                priority: 1,
            },
        )
        .await?;
    assert_eq!(reply.phase, ComputationPhase::Completed);
    assert_eq!(ClearTextEngine.decrypt(&reply.result)?, vec![6.0]);

    let status = client.get_task_status(&task_id).await?;
    assert_eq!(status.phase, ComputationPhase::Completed);
    assert_eq!(status.progress, 1.0);

    let node = client.get_node_status(&NodeId::try_from("n1")?).await?;
    assert_eq!(node.status, NodeStatus::Idle);
    assert_eq!(node.active_tasks, 0);
    assert_eq!(
        node.metrics.get("completed_total").map(String::as_str),
        Some("1")
    );
    Ok(())
}

#[tokio::test]
async fn polling_an_unknown_task_over_grpc_is_an_error() -> Result<()> {
    let (addr, _) = spawn_node(&[1.0]).await?;
    let client = GrpcComputeClient::connect(&addr.to_string(), Duration::from_secs(5)).await?;

    let result = client.get_task_status(&TaskId::try_from("never-seen")?).await;
    assert!(result.is_err_and(|e| e.to_string().contains("not found")));
    Ok(())
}

#[tokio::test]
async fn connecting_to_a_dead_endpoint_fails() {
    // Port 1 is never listening.
    let result = GrpcComputeClient::connect("127.0.0.1:1", Duration::from_millis(200)).await;
    assert!(result.is_err_and(|e| e.to_string().starts_with("Unreachable node:")));
}
