//! The worker loop
//!
//! # States
//!
//! ```text
//! Idle ──claim──► Claimed ──dispatch──► Dispatched ──┬─► Completed ─► Idle
//!   ▲                                                 └─► Released ──► Idle
//!   └── queue empty: sleep idle-time
//! ```
//!
//! One task is held at a time. The held task lives in a `ClaimGuard`, so
//! every exit path either completes or releases it.

use crate::api::ApiClient;
use crate::config::{Config, CrawlerConfig, PriorityConfig};
use crate::crawler::guard::ClaimGuard;
use crate::crawler::queue::claim_next;
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::state::CredentialPool;
use crate::storage::{open_storage, SharedStorage};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

/// What a single step of the loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing was claimable
    Idle,

    /// The held task reached a terminal state
    Completed { success: bool },

    /// The held task went back to the queue
    Released,
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: u64,
    pub failed: u64,
    pub released: u64,
    pub errors: u64,
}

/// A single crawl worker
pub struct Worker {
    worker_id: String,
    client: ApiClient,
    registry: HandlerRegistry,
    storage: SharedStorage,
    crawler: CrawlerConfig,
    priority: PriorityConfig,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<String>,
        client: ApiClient,
        registry: HandlerRegistry,
        storage: SharedStorage,
        crawler: CrawlerConfig,
        priority: PriorityConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            client,
            registry,
            storage,
            crawler,
            priority,
        }
    }

    /// Builds a worker with the standard handlers from configuration
    pub fn from_config(config: &Config, worker_id: impl Into<String>) -> crate::Result<Self> {
        let storage = open_storage(Path::new(&config.storage.database_path))?;
        let credentials = CredentialPool::new(config.credentials.clone())?;
        let client = ApiClient::new(&config.api, credentials)?;

        Ok(Self::new(
            worker_id,
            client,
            HandlerRegistry::standard(),
            storage,
            config.crawler.clone(),
            config.priority.clone(),
        ))
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Claims one task and drives it to completion or release
    ///
    /// Handler failures are logged and turn into `Released`. An error is
    /// returned only when the queue itself could not be read or updated.
    pub async fn step(&mut self) -> crate::Result<StepOutcome> {
        let claimed = claim_next(
            &self.storage,
            &self.worker_id,
            &self.priority,
            self.crawler.claim_backoff(),
        )
        .await?;
        let Some(mut task) = claimed else {
            return Ok(StepOutcome::Idle);
        };
        let guard = ClaimGuard::new(self.storage.clone(), &task, &self.worker_id);

        tracing::info!(
            "Start {} {} (task {}, {} requests left on {})",
            task.method,
            task.login,
            task.task_id,
            self.client.remaining_requests(),
            self.client.active_username()
        );

        let Some(handler) = self.registry.get(&task.method) else {
            // Releasing would hand it straight back to the next claim
            tracing::warn!(
                "No handler for method '{}', finishing {} as failed",
                task.method,
                task.login
            );
            guard.complete(false, Utc::now())?;
            return Ok(StepOutcome::Completed { success: false });
        };

        let mut ctx = HandlerContext::new(&mut self.client, &self.storage);
        let result = handler.process(&mut task, &mut ctx).await;

        match (result, task.success, task.completed_dt) {
            (Ok(()), Some(success), Some(completed_at)) => {
                guard.complete(success, completed_at)?;
                tracing::info!(
                    "End {} {}: {} ({} requests left)",
                    task.method,
                    task.login,
                    if success { "success" } else { "failure" },
                    self.client.remaining_requests()
                );
                Ok(StepOutcome::Completed { success })
            }
            (Ok(()), _, _) => {
                tracing::error!(
                    "Handler for {} returned without an outcome for {}",
                    task.method,
                    task.login
                );
                self.release(guard, &task.login, &task.method);
                Ok(StepOutcome::Released)
            }
            (Err(e), _, _) => {
                tracing::error!("{} {} failed: {}", task.method, task.login, e);
                self.release(guard, &task.login, &task.method);
                Ok(StepOutcome::Released)
            }
        }
    }

    fn release(&self, guard: ClaimGuard, login: &str, method: &str) {
        match guard.release() {
            Ok(true) => tracing::info!("Released ({}, {})", login, method),
            Ok(false) => {}
            Err(e) => tracing::error!(
                "Rollback failed for ({}, {}), task stays claimed: {}",
                login,
                method,
                e
            ),
        }
    }

    /// Runs until `shutdown` carries `true`
    ///
    /// The flag is checked between tasks and interrupts idle and failure
    /// pauses. A task in flight is allowed to finish.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        tracing::info!("Worker {} started", self.worker_id);

        loop {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, stopping worker {}", self.worker_id);
                break;
            }

            match self.step().await {
                Ok(StepOutcome::Idle) => {
                    tracing::debug!(
                        "Queue empty, sleeping {}s",
                        self.crawler.idle_interval().as_secs()
                    );
                    pause(self.crawler.idle_interval(), &mut shutdown).await;
                }
                Ok(StepOutcome::Completed { success: true }) => stats.succeeded += 1,
                Ok(StepOutcome::Completed { success: false }) => stats.failed += 1,
                Ok(StepOutcome::Released) => {
                    stats.released += 1;
                    pause(self.crawler.failure_pause(), &mut shutdown).await;
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::error!("Worker step failed: {}", e);
                    pause(self.crawler.failure_pause(), &mut shutdown).await;
                }
            }
        }

        tracing::info!(
            "Worker {} stopped: {} succeeded, {} failed, {} released, {} errors",
            self.worker_id,
            stats.succeeded,
            stats.failed,
            stats.released,
            stats.errors
        );
        stats
    }
}

/// Sleeps for `duration` or until the shutdown flag changes
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    if duration.is_zero() {
        return;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        changed = shutdown.changed() => {
            // Sender gone: nobody can request a stop, so sleep it out
            if changed.is_err() {
                tokio::time::sleep(duration).await;
            }
        }
    }
}
