use ::std::net::SocketAddr;
use ::std::sync::Arc;
use ::std::time::Duration;

use ::opal_common::{
    client::GrpcComputeClient,
    computation_grpc::computation_service_server::ComputationServiceServer,
    config::{load_config, Args},
    error::{OpalError, Result},
    tokio,
    tracing::info,
    tracing_subscriber,
};
use ::opal_coordinator::{
    dispatch::{run_health_sweep, run_task_purge, Dispatcher},
    node_manager::NodeManager,
    service::{Coordinator, CoordinatorService},
    task_manager::TaskManager,
    CoordinatorConfig,
};
use ::tonic::transport::Server;

#[tokio::main]
/// Start the Opal coordinator.
async fn main() -> Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let Args { config_path } = Args::parse_args();
    let CoordinatorConfig {
        bind_address,
        max_concurrent_tasks,
        max_tasks_per_node,
        node_offline_threshold_secs,
        health_sweep_interval_secs,
        dispatch_poll_interval_millis,
        task_retention_secs,
        rpc_timeout_secs,
    } = load_config(&config_path)?;

    let node_manager = Arc::new(NodeManager::<GrpcComputeClient>::new(
        max_tasks_per_node,
        Duration::from_secs(rpc_timeout_secs),
    ));
    let task_manager = Arc::new(TaskManager::new(max_concurrent_tasks));
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&node_manager),
        Arc::clone(&task_manager),
    ));

    let dispatcher = Dispatcher::new(
        Arc::clone(&node_manager),
        Arc::clone(&task_manager),
        Duration::from_millis(dispatch_poll_interval_millis),
    );
    tokio::spawn(dispatcher.run());
    tokio::spawn(run_health_sweep(
        Arc::clone(&node_manager),
        Duration::from_secs(health_sweep_interval_secs),
        Duration::from_secs(node_offline_threshold_secs),
    ));
    tokio::spawn(run_task_purge(
        Arc::clone(&task_manager),
        Duration::from_secs(task_retention_secs),
    ));

    let addr: SocketAddr = bind_address
        .parse()
        .map_err(OpalError::fail_to_start_coordinator)?;
    info!("Opal coordinator is listening on {}", addr);
    Server::builder()
        .add_service(ComputationServiceServer::new(CoordinatorService::new(
            coordinator,
        )))
        .serve(addr)
        .await
        .map_err(OpalError::fail_to_start_coordinator)?;
    Ok(())
}
