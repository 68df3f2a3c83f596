//! Scoped ownership of a claimed task
//!
//! A `ClaimGuard` is created as soon as a claim succeeds. Unless it is
//! consumed by `complete` or `release`, dropping it releases the task, which
//! covers early returns, errors, panics and a cancelled worker future.
//!
//! Every write is conditioned on the guard's worker still holding the claim,
//! so a task requeued out from under a slow worker stays with its new owner.

use crate::state::Task;
use crate::storage::{lock_storage, SharedStorage, StorageResult, TaskQueue};
use chrono::{DateTime, Utc};
use std::sync::PoisonError;

pub struct ClaimGuard {
    storage: SharedStorage,
    login: String,
    method: String,
    worker_id: String,
    armed: bool,
}

impl ClaimGuard {
    pub fn new(storage: SharedStorage, task: &Task, worker_id: &str) -> Self {
        Self {
            storage,
            login: task.login.clone(),
            method: task.method.clone(),
            worker_id: worker_id.to_string(),
            armed: true,
        }
    }

    /// Persists the outcome and disarms the guard
    ///
    /// Returns false if the claim was lost before completion; the task is
    /// then left untouched. On error the guard is still armed and releases
    /// the task as it drops.
    pub fn complete(mut self, success: bool, completed_at: DateTime<Utc>) -> StorageResult<bool> {
        let held = lock_storage(&self.storage)?.complete_held(
            &self.login,
            &self.method,
            &self.worker_id,
            success,
            completed_at,
        )?;
        self.armed = false;
        if !held {
            self.warn_lost("completing");
        }
        Ok(held)
    }

    /// Returns the task to the queue
    ///
    /// Returns false if the claim had already been lost.
    pub fn release(mut self) -> StorageResult<bool> {
        self.armed = false;
        let held =
            lock_storage(&self.storage)?.release_held(&self.login, &self.method, &self.worker_id)?;
        if !held {
            self.warn_lost("releasing");
        }
        Ok(held)
    }

    fn warn_lost(&self, action: &str) {
        tracing::warn!(
            "Claim on ({}, {}) no longer held by {}, skipped {}",
            self.login,
            self.method,
            self.worker_id,
            action
        );
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // A panic inside a storage closure poisons the lock; the connection
        // itself is still usable for the release.
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        match storage.release_held(&self.login, &self.method, &self.worker_id) {
            Ok(true) => tracing::warn!("Released ({}, {}) on abandon", self.login, self.method),
            Ok(false) => self.warn_lost("release on abandon"),
            Err(e) => tracing::error!(
                "Rollback failed for ({}, {}), task stays claimed: {}",
                self.login,
                self.method,
                e
            ),
        }
    }
}
