mod common;

use ::std::sync::atomic::Ordering;
use ::std::sync::Arc;
use ::std::time::Duration;

use ::opal_common::{
    error::Result,
    node::NodeId,
    task::{Operation, TaskParams, TaskSpec, TaskStatus},
    tokio,
};
use ::opal_coordinator::{
    dispatch::Dispatcher, node_manager::NodeManager, task_manager::TaskManager,
};
use common::{node_info, FakeClient};

const RPC_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Fixture {
    node_manager: Arc<NodeManager<FakeClient>>,
    task_manager: Arc<TaskManager>,
    dispatcher: Dispatcher<FakeClient>,
}

fn fixture(max_tasks_per_node: u32, max_concurrent_tasks: usize) -> Fixture {
    let node_manager = Arc::new(NodeManager::new(max_tasks_per_node, RPC_TIMEOUT));
    let task_manager = Arc::new(TaskManager::new(max_concurrent_tasks));
    let dispatcher = Dispatcher::new(
        Arc::clone(&node_manager),
        Arc::clone(&task_manager),
        POLL_INTERVAL,
    );
    Fixture {
        node_manager,
        task_manager,
        dispatcher,
    }
}

fn mean_task(priority: i32) -> TaskSpec {
    TaskSpec {
        operation: Operation::Mean,
        data_id: "d1".to_owned(),
        params: TaskParams::new(),
        priority,
    }
}

#[tokio::test]
async fn dispatches_to_a_node_and_records_completion() -> Result<()> {
    let f = fixture(5, 10);
    f.node_manager.register(node_info("n1", "10.0.0.1:50051")).await?;
    let n1 = NodeId::try_from("n1")?;
    let task_id = f.task_manager.submit(mean_task(1));

    assert!(f.dispatcher.dispatch_once().await);

    let record = f.task_manager.status(&task_id)?;
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.result, Some(vec![42]));
    assert_eq!(record.error, None);
    // The reservation was released once the result came back.
    assert_eq!(f.node_manager.get_node(&n1).unwrap().active_tasks, 0);
    let client = f.node_manager.client(&n1).unwrap();
    assert_eq!(client.submissions.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn remote_rejection_fails_the_task_and_releases_the_node() -> Result<()> {
    let f = fixture(5, 10);
    f.node_manager.register(node_info("n1", "reject:10.0.0.1:50051")).await?;
    let n1 = NodeId::try_from("n1")?;
    let task_id = f.task_manager.submit(mean_task(1));

    assert!(f.dispatcher.dispatch_once().await);

    let record = f.task_manager.status(&task_id)?;
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert_eq!(record.result, None);
    assert_eq!(f.node_manager.get_node(&n1).unwrap().active_tasks, 0);
    Ok(())
}

#[tokio::test]
async fn task_survives_until_a_node_shows_up() -> Result<()> {
    let f = fixture(5, 10);
    let task_id = f.task_manager.submit(mean_task(1));

    // No node registered: the dequeued task goes back to the queue.
    assert!(!f.dispatcher.dispatch_once().await);
    assert_eq!(f.task_manager.status(&task_id)?.status, TaskStatus::Pending);
    assert_eq!(f.task_manager.pending_count(), 1);

    f.node_manager.register(node_info("n1", "10.0.0.1:50051")).await?;
    assert!(f.dispatcher.dispatch_once().await);
    assert_eq!(
        f.task_manager.status(&task_id)?.status,
        TaskStatus::Completed
    );
    Ok(())
}

#[tokio::test]
async fn equal_priority_tasks_complete_in_submission_order() -> Result<()> {
    let f = fixture(5, 10);
    f.node_manager.register(node_info("n1", "10.0.0.1:50051")).await?;
    let low = f.task_manager.submit(mean_task(3));
    let high = f.task_manager.submit(mean_task(1));

    assert!(f.dispatcher.dispatch_once().await);
    assert_eq!(f.task_manager.status(&high)?.status, TaskStatus::Completed);
    assert_eq!(f.task_manager.status(&low)?.status, TaskStatus::Pending);

    assert!(f.dispatcher.dispatch_once().await);
    assert_eq!(f.task_manager.status(&low)?.status, TaskStatus::Completed);
    Ok(())
}
