//! Storage traits and error types
//!
//! `TaskQueue` is the claim/complete/release protocol the worker relies on.
//! `GraphStore` is the surface handlers write crawled entities through.

use crate::config::PriorityConfig;
use crate::state::{NewTask, Task};
use crate::storage::{ClaimAttempt, MethodStats, RepoRecord, UserRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Task not found: ({login}, {method})")]
    TaskNotFound { login: String, method: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The shared work queue
///
/// Claims are optimistic: a candidate is read without locking, then taken
/// with a conditional update that only succeeds while `assignee` is unset.
pub trait TaskQueue {
    /// Reads the best claimable task by `(bucket, task_id)` without claiming it
    fn select_candidate(&self, priority: &PriorityConfig) -> StorageResult<Option<Task>>;

    /// Conditionally assigns `candidate` to `worker_id`
    ///
    /// Returns true if exactly one row was updated, false if another worker
    /// claimed it first.
    fn try_assign(
        &mut self,
        candidate: &Task,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// One claim attempt: select a candidate and try to take it
    fn try_claim(
        &mut self,
        worker_id: &str,
        priority: &PriorityConfig,
        at: DateTime<Utc>,
    ) -> StorageResult<ClaimAttempt> {
        let Some(mut candidate) = self.select_candidate(priority)? else {
            return Ok(ClaimAttempt::Empty);
        };

        if !self.try_assign(&candidate, worker_id, at)? {
            return Ok(ClaimAttempt::RaceLost);
        }

        candidate.assignee = Some(worker_id.to_string());
        candidate.assigned_dt = Some(at);
        Ok(ClaimAttempt::Claimed(candidate))
    }

    /// Marks a task terminal with its outcome
    fn complete(
        &mut self,
        login: &str,
        method: &str,
        success: bool,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Returns a task to the claimable state, clearing claim and outcome fields
    ///
    /// Unconditional; used for manual recovery.
    fn release(&mut self, login: &str, method: &str) -> StorageResult<()>;

    /// Like `complete`, but only while `worker_id` still holds the claim
    ///
    /// Returns false if the claim was lost: the task was requeued and is now
    /// unclaimed or held by another worker. Nothing is written in that case.
    fn complete_held(
        &mut self,
        login: &str,
        method: &str,
        worker_id: &str,
        success: bool,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Like `release`, but only while `worker_id` still holds the claim
    fn release_held(&mut self, login: &str, method: &str, worker_id: &str)
        -> StorageResult<bool>;

    /// Inserts a task unless `(login, method)` already exists
    ///
    /// Returns true if a row was created.
    fn enqueue(&mut self, task: &NewTask) -> StorageResult<bool>;

    fn get_task(&self, login: &str, method: &str) -> StorageResult<Option<Task>>;

    /// Releases claimed, unfinished tasks assigned before `cutoff`
    ///
    /// Returns the number of tasks released.
    fn requeue_stale(&mut self, cutoff: DateTime<Utc>) -> StorageResult<usize>;

    /// Per-method task counts
    fn queue_stats(&self) -> StorageResult<Vec<MethodStats>>;
}

/// Persistence for crawled graph entities
pub trait GraphStore {
    // ===== Accounts =====

    /// ETag stored with the account, for conditional requests
    fn user_etag(&self, login: &str) -> StorageResult<Option<String>>;

    fn user_id_for_login(&self, login: &str) -> StorageResult<Option<i64>>;

    /// Inserts or replaces an account, keeping its existing score
    fn upsert_user(&mut self, user: &UserRecord) -> StorageResult<()>;

    /// Records that an account was re-checked and found unchanged
    fn touch_user(&mut self, login: &str, crawled_at: DateTime<Utc>) -> StorageResult<()>;

    fn upsert_repo(&mut self, repo: &RepoRecord) -> StorageResult<()>;

    // ===== Edges =====

    fn add_following(&mut self, src_id: i64, dest_id: i64) -> StorageResult<()>;

    fn add_watcher(&mut self, watcher_id: i64, repo_id: i64) -> StorageResult<()>;

    fn add_stargazer(&mut self, stargazer_id: i64, repo_id: i64) -> StorageResult<()>;

    /// Inserts or updates a contributor edge with its weight
    fn add_contributor(
        &mut self,
        repo_id: i64,
        contributor_id: i64,
        contributions: i64,
    ) -> StorageResult<()>;

    fn add_org_member(&mut self, org_id: i64, member_id: i64) -> StorageResult<()>;

    // ===== Export =====

    /// All account ids, ascending
    fn user_ids(&self) -> StorageResult<Vec<i64>>;

    /// Ids of accounts the given account follows
    fn following_ids(&self, user_id: i64) -> StorageResult<Vec<i64>>;

    /// `(owner_id, contributions)` for repositories the account contributed to
    fn contributed_owners(&self, user_id: i64) -> StorageResult<Vec<(i64, i64)>>;

    /// Owner ids of repositories the account starred
    fn starred_owners(&self, user_id: i64) -> StorageResult<Vec<i64>>;

    /// Owner ids of repositories the account watches
    fn watched_owners(&self, user_id: i64) -> StorageResult<Vec<i64>>;

    /// Upstream owner ids of the account's forked repositories
    fn fork_owners(&self, user_id: i64) -> StorageResult<Vec<i64>>;
}
