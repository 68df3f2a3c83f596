use crate::common::{memory_storage, worker};
use devrank_crawler::crawler::{StepOutcome, WorkerStats};
use devrank_crawler::storage::{lock_storage, GraphStore, SharedStorage, TaskQueue};
use devrank_crawler::{NewTask, Task, TaskKind};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn enqueue(storage: &SharedStorage, task: NewTask) {
    lock_storage(storage).unwrap().enqueue(&task).unwrap();
}

fn task(storage: &SharedStorage, login: &str, method: &str) -> Task {
    lock_storage(storage)
        .unwrap()
        .get_task(login, method)
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_step_completes_user_task_and_queues_follow_ups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "4999")
                .insert_header("ETag", "\"abc\"")
                .set_body_json(json!({
                    "id": 583231,
                    "login": "octocat",
                    "name": "The Octocat",
                    "company": "@github",
                    "hireable": null
                })),
        )
        .mount(&server)
        .await;

    let storage = memory_storage();
    enqueue(&storage, NewTask::new(TaskKind::User, "octocat"));
    let mut w = worker(&server.uri(), 3, storage.clone());

    let outcome = w.step().await.unwrap();
    assert_eq!(outcome, StepOutcome::Completed { success: true });

    let done = task(&storage, "octocat", "user");
    assert_eq!(done.success, Some(true));
    assert!(done.completed_dt.is_some());
    assert_eq!(done.assignee.as_deref(), Some("test-worker"));

    {
        let s = lock_storage(&storage).unwrap();
        assert_eq!(s.user_etag("octocat").unwrap().as_deref(), Some("\"abc\""));
        for method in ["followers", "followings", "repos", "orgs"] {
            let follow_up = s.get_task("octocat", method).unwrap().unwrap();
            assert_eq!(follow_up.user_id, Some(583231));
            assert_eq!(follow_up.root_login.as_deref(), Some("octocat"));
            assert!(follow_up.is_claimable());
        }
    }

    // Collapsed bucket is FIFO: followers was queued before followings
    Mock::given(method("GET"))
        .and(path("/users/octocat/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    assert_eq!(
        w.step().await.unwrap(),
        StepOutcome::Completed { success: true }
    );
    assert_eq!(task(&storage, "octocat", "followers").success, Some(true));
}

#[tokio::test]
async fn test_handler_failure_releases_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).insert_header("X-RateLimit-Remaining", "10"))
        .mount(&server)
        .await;

    let storage = memory_storage();
    enqueue(&storage, NewTask::new(TaskKind::User, "octocat"));
    let mut w = worker(&server.uri(), 2, storage.clone());

    assert_eq!(w.step().await.unwrap(), StepOutcome::Released);

    let released = task(&storage, "octocat", "user");
    assert!(released.assignee.is_none());
    assert!(released.assigned_dt.is_none());
    assert!(released.success.is_none());
}

#[tokio::test]
async fn test_not_found_completes_as_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).insert_header("X-RateLimit-Remaining", "10"))
        .mount(&server)
        .await;

    let storage = memory_storage();
    enqueue(&storage, NewTask::new(TaskKind::User, "ghost"));
    let mut w = worker(&server.uri(), 3, storage.clone());

    assert_eq!(
        w.step().await.unwrap(),
        StepOutcome::Completed { success: false }
    );
    assert_eq!(task(&storage, "ghost", "user").success, Some(false));
}

#[tokio::test]
async fn test_unknown_method_is_finished_not_released() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    enqueue(
        &storage,
        NewTask {
            method: "gists".to_string(),
            ..NewTask::new(TaskKind::User, "octocat")
        },
    );
    let mut w = worker(&server.uri(), 3, storage.clone());

    assert_eq!(
        w.step().await.unwrap(),
        StepOutcome::Completed { success: false }
    );
    assert_eq!(w.step().await.unwrap(), StepOutcome::Idle);
    assert_eq!(task(&storage, "octocat", "gists").success, Some(false));
}

#[tokio::test]
async fn test_empty_queue_is_idle() {
    let server = MockServer::start().await;
    let mut w = worker(&server.uri(), 3, memory_storage());
    assert_eq!(w.step().await.unwrap(), StepOutcome::Idle);
}

#[tokio::test]
async fn test_cancelled_step_releases_held_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(json!({"id": 1, "login": "slow"})),
        )
        .mount(&server)
        .await;

    let storage = memory_storage();
    enqueue(&storage, NewTask::new(TaskKind::User, "slow"));
    let mut w = worker(&server.uri(), 1, storage.clone());

    let result = tokio::time::timeout(Duration::from_millis(300), w.step()).await;
    assert!(result.is_err());

    let abandoned = task(&storage, "slow", "user");
    assert!(abandoned.assignee.is_none());
    assert!(abandoned.success.is_none());
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "100")
                .set_body_json(json!({"id": 1, "login": "octocat"})),
        )
        .mount(&server)
        .await;
    // Every follow-up listing is empty
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "100")
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    let storage = memory_storage();
    enqueue(&storage, NewTask::new(TaskKind::User, "octocat"));
    let mut w = worker(&server.uri(), 3, storage.clone());

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let _ = tx.send(true);
    });

    let stats = tokio::time::timeout(Duration::from_secs(10), w.run(rx))
        .await
        .unwrap();

    assert_eq!(
        stats,
        WorkerStats {
            succeeded: 5,
            failed: 0,
            released: 0,
            errors: 0
        }
    );
}

#[tokio::test]
async fn test_run_with_shutdown_already_requested() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    enqueue(&storage, NewTask::new(TaskKind::User, "octocat"));
    let mut w = worker(&server.uri(), 3, storage.clone());

    let (_tx, rx) = watch::channel(true);
    let stats = w.run(rx).await;

    assert_eq!(stats, WorkerStats::default());
    assert!(task(&storage, "octocat", "user").is_claimable());
}
