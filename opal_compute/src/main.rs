use ::std::time::Duration;

use ::opal_common::{
    anyhow::anyhow,
    client::{ComputeClient, GrpcComputeClient},
    computation_grpc::computation_service_server::ComputationServiceServer,
    config::{load_config, Args},
    error::{OpalError, Result},
    node::{NodeId, NodeInfo},
    tokio::{self, net::TcpListener},
    tracing::info,
    tracing_subscriber,
};
use ::opal_compute::{
    engine::ClearTextEngine, service::ComputeNodeService, storage::MemoryStore, ComputeNodeConfig,
};
use ::tonic::transport::{server::TcpIncoming, Server};

#[tokio::main]
/// Start an Opal compute node.
async fn main() -> Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let Args { config_path } = Args::parse_args();
    let ComputeNodeConfig {
        node_id,
        bind_address,
        advertise_address,
        coordinator_address,
        max_workers,
        rpc_timeout_secs,
        capabilities,
    } = load_config(&config_path)?;
    let node_id = NodeId::try_from(node_id)?;
    let rpc_timeout = Duration::from_secs(rpc_timeout_secs);

    // Bind before registering so the coordinator can dial back right away.
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(OpalError::fail_to_start_compute_node)?;
    let local_addr = listener
        .local_addr()
        .map_err(OpalError::fail_to_start_compute_node)?;
    info!("Opal compute node {} is listening on {}", node_id, local_addr);

    let coordinator = GrpcComputeClient::connect(&coordinator_address, rpc_timeout)
        .await
        .map_err(OpalError::fail_to_start_compute_node)?;
    let outcome = coordinator
        .register_node(&NodeInfo {
            id: node_id.clone(),
            address: advertise_address,
            capabilities,
        })
        .await?;
    if !outcome.accepted {
        return Err(OpalError::fail_to_start_compute_node(anyhow!(
            "Coordinator rejected registration: {}",
            outcome.message
        )));
    }
    info!("Registered with coordinator at {}", coordinator_address);

    // same default value of `nodelay` and `keepalive` as those in [Server]
    let incoming = TcpIncoming::from_listener(listener, false, None)
        .map_err(|e| OpalError::fail_to_start_compute_node(anyhow!("{}", e)))?;
    let service = ComputeNodeService::new(node_id, ClearTextEngine, MemoryStore::new(), max_workers);
    Server::builder()
        .add_service(ComputationServiceServer::new(service))
        .serve_with_incoming(incoming)
        .await
        .map_err(OpalError::fail_to_start_compute_node)?;
    Ok(())
}
