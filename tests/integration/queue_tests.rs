use chrono::{Duration as ChronoDuration, Utc};
use devrank_crawler::config::PriorityConfig;
use devrank_crawler::storage::{ClaimAttempt, SqliteStorage, TaskQueue};
use devrank_crawler::{NewTask, TaskKind};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

fn open(path: &Path) -> SqliteStorage {
    SqliteStorage::new(path).unwrap()
}

fn db() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    (dir, path)
}

#[test]
fn test_two_processes_racing_for_one_candidate() {
    let (_dir, path) = db();
    let mut first = open(&path);
    let mut second = open(&path);
    first.enqueue(&NewTask::new(TaskKind::User, "a")).unwrap();
    first.enqueue(&NewTask::new(TaskKind::User, "b")).unwrap();

    let priority = PriorityConfig::default();
    let seen_by_first = first.select_candidate(&priority).unwrap().unwrap();
    let seen_by_second = second.select_candidate(&priority).unwrap().unwrap();
    assert_eq!(seen_by_first.task_id, seen_by_second.task_id);

    assert!(first.try_assign(&seen_by_first, "w1", Utc::now()).unwrap());
    assert!(!second.try_assign(&seen_by_second, "w2", Utc::now()).unwrap());

    // The loser falls through to the next candidate
    match second.try_claim("w2", &priority, Utc::now()).unwrap() {
        ClaimAttempt::Claimed(task) => assert_eq!(task.login, "b"),
        other => panic!("expected a claim, got {:?}", other),
    }

    let a = first.get_task("a", "user").unwrap().unwrap();
    assert_eq!(a.assignee.as_deref(), Some("w1"));
}

#[test]
fn test_concurrent_workers_never_share_a_task() {
    let (_dir, path) = db();
    {
        let mut storage = open(&path);
        for i in 0..40 {
            let kind = if i % 2 == 0 { TaskKind::User } else { TaskKind::Followers };
            storage
                .enqueue(&NewTask::new(kind, format!("user-{}", i)))
                .unwrap();
        }
    }

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let path = path.clone();
            std::thread::spawn(move || {
                let mut storage = open(&path);
                let priority = PriorityConfig::default();
                let worker = format!("w{}", n);
                let mut claimed = Vec::new();
                loop {
                    match storage.try_claim(&worker, &priority, Utc::now()).unwrap() {
                        ClaimAttempt::Claimed(task) => claimed.push(task.task_id),
                        ClaimAttempt::RaceLost => continue,
                        ClaimAttempt::Empty => break,
                    }
                }
                claimed
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap());
    }

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(all.len(), 40);
    assert_eq!(unique.len(), 40);
}

#[test]
fn test_example_scenario_on_disk() {
    let (_dir, path) = db();
    let mut storage = open(&path);
    storage.enqueue(&NewTask::new(TaskKind::Followers, "b")).unwrap();
    storage.enqueue(&NewTask::new(TaskKind::User, "a")).unwrap();
    let priority = PriorityConfig::default();

    let ClaimAttempt::Claimed(a) = storage.try_claim("w1", &priority, Utc::now()).unwrap() else {
        panic!("expected a");
    };
    assert_eq!((a.login.as_str(), a.task_type), ("a", 1));
    storage.complete("a", "user", true, Utc::now()).unwrap();

    let ClaimAttempt::Claimed(b) = storage.try_claim("w1", &priority, Utc::now()).unwrap() else {
        panic!("expected b");
    };
    assert_eq!(b.login, "b");
}

#[test]
fn test_crashed_worker_claim_is_recovered() {
    let (_dir, path) = db();
    {
        let mut storage = open(&path);
        storage.enqueue(&NewTask::new(TaskKind::Repos, "octocat")).unwrap();
        let attempt = storage
            .try_claim("dead-worker", &PriorityConfig::default(), Utc::now())
            .unwrap();
        assert!(matches!(attempt, ClaimAttempt::Claimed(_)));
        // Connection dropped without complete or release
    }

    let mut storage = open(&path);
    let priority = PriorityConfig::default();
    assert_eq!(
        storage.try_claim("w2", &priority, Utc::now()).unwrap(),
        ClaimAttempt::Empty
    );

    let released = storage
        .requeue_stale(Utc::now() + ChronoDuration::minutes(1))
        .unwrap();
    assert_eq!(released, 1);

    let task = storage.get_task("octocat", "repos").unwrap().unwrap();
    assert!(task.assignee.is_none());
    assert!(task.assigned_dt.is_none());
    assert!(task.completed_dt.is_none());
    assert!(task.success.is_none());

    assert!(matches!(
        storage.try_claim("w2", &priority, Utc::now()).unwrap(),
        ClaimAttempt::Claimed(_)
    ));
}
