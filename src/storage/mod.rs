//! Storage module for the shared queue and the crawled graph
//!
//! This module handles all database operations, including:
//! - SQLite initialization and schema management
//! - The compare-and-swap claim protocol on the `queue` table
//! - Completion, release and stale-claim recovery
//! - Graph entity persistence for handlers

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{GraphStore, StorageError, StorageResult, TaskQueue};

use crate::state::Task;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared by the worker, its claim guard and the handlers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens the database and wraps it for sharing
pub fn open_storage(path: &Path) -> StorageResult<SharedStorage> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Locks shared storage, mapping a poisoned lock to an error
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Outcome of a single claim attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimAttempt {
    /// The task now belongs to the caller
    Claimed(Task),

    /// Another worker updated the candidate first
    RaceLost,

    /// Nothing is claimable
    Empty,
}

/// An account row
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub etag: Option<String>,
    pub gravatar_id: Option<String>,
    pub avatar_url: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub hireable: Option<bool>,
    pub crawled_at: DateTime<Utc>,
}

/// A repository row
#[derive(Debug, Clone, PartialEq)]
pub struct RepoRecord {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub fork: bool,
    pub fork_owner_id: Option<i64>,
    pub language: Option<String>,
    pub etag: Option<String>,
    pub crawled_at: DateTime<Utc>,
}

/// Task counts for one method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodStats {
    pub method: String,
    /// Claimable tasks
    pub pending: u64,
    /// Claimed and not yet finished
    pub claimed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl MethodStats {
    pub fn total(&self) -> u64 {
        self.pending + self.claimed + self.succeeded + self.failed
    }
}
