//! Task handlers
//!
//! Each queue `method` maps to one `Handler`. A handler fetches what it
//! needs through the `ApiClient`, writes graph rows through `GraphStore`,
//! may enqueue newly discovered subjects, and records the task outcome with
//! `Task::finish` before returning. Returning an error leaves the outcome
//! unset and the worker releases the task.

mod orgs;
mod payload;
mod repo_edges;
mod repos;
mod social;
mod user;

pub use orgs::OrgsHandler;
pub use payload::{Account, Contributor, ParentRepo, RepoOwner, Repository};
pub use repo_edges::RepoEdgesHandler;
pub use repos::ReposHandler;
pub use social::SocialHandler;
pub use user::UserHandler;

use crate::api::{ApiClient, ApiError, Target};
use crate::state::{NewTask, Task, TaskKind};
use crate::storage::{
    lock_storage, GraphStore, SharedStorage, SqliteStorage, StorageError, StorageResult, TaskQueue,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

/// Errors a handler can fail with
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The subject's account id is not known yet; a `user` task was queued
    #[error("Account id for '{0}' is not known yet")]
    SubjectUnknown(String),
}

/// What a handler gets to work with while processing one task
pub struct HandlerContext<'a> {
    pub client: &'a mut ApiClient,
    pub storage: &'a SharedStorage,
}

impl<'a> HandlerContext<'a> {
    pub fn new(client: &'a mut ApiClient, storage: &'a SharedStorage) -> Self {
        Self { client, storage }
    }

    /// Runs a storage operation under the lock
    ///
    /// The guard never outlives the closure, so it is not held across an
    /// await point.
    pub fn with_storage<T>(
        &self,
        op: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T, HandlerError> {
        let mut storage = lock_storage(self.storage)?;
        Ok(op(&mut storage)?)
    }
}

/// A strategy for one task kind
#[async_trait]
pub trait Handler: Send + Sync {
    /// The task kind this handler processes
    fn kind(&self) -> TaskKind;

    /// Processes a claimed task and records its outcome on it
    async fn process(&self, task: &mut Task, ctx: &mut HandlerContext<'_>)
        -> Result<(), HandlerError>;
}

/// Fixed mapping from method name to handler, built once at startup
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a handler for every task kind
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(UserHandler));
        registry.register(Box::new(SocialHandler::followers()));
        registry.register(Box::new(SocialHandler::followings()));
        registry.register(Box::new(ReposHandler));
        registry.register(Box::new(OrgsHandler));
        registry.register(Box::new(RepoEdgesHandler::watchers()));
        registry.register(Box::new(RepoEdgesHandler::stargazers()));
        registry.register(Box::new(RepoEdgesHandler::contributors()));
        registry
    }

    /// Registers a handler under its kind's method, replacing any previous one
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        self.handlers.insert(handler.kind().method(), handler);
    }

    pub fn get(&self, method: &str) -> Option<&dyn Handler> {
        self.handlers.get(method).map(|h| h.as_ref())
    }

    /// Registered methods, sorted
    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<_> = self.handlers.keys().copied().collect();
        methods.sort_unstable();
        methods
    }
}

/// Result of walking a paginated listing
pub(crate) enum Listing<T> {
    /// Every page was fetched
    Items(Vec<T>),

    /// A page came back with a non-data status (404, 403, ...)
    Unavailable(StatusCode),
}

/// Fetches a listing and follows `rel="next"` links to the end
///
/// Any page that fails to return data makes the whole listing unavailable,
/// so a truncated walk is never stored as complete.
pub(crate) async fn fetch_listing<T: DeserializeOwned>(
    client: &mut ApiClient,
    path: &str,
) -> Result<Listing<T>, HandlerError> {
    let first = client.get(Target::Path(path), None).await?;
    if !first.is_fresh() {
        return Ok(Listing::Unavailable(first.status()));
    }

    let mut items: Vec<T> = first.json_list()?;
    let mut next = first.next_page();
    let mut pages = 1;

    while let Some(url) = next {
        let page = client.get(Target::Url(&url), None).await?;
        if !page.is_fresh() {
            tracing::warn!(
                "Pagination of {} failed at page {}: status {}",
                path,
                pages + 1,
                page.status()
            );
            return Ok(Listing::Unavailable(page.status()));
        }
        items.extend(page.json_list::<T>()?);
        next = page.next_page();
        pages += 1;
    }

    tracing::debug!("Fetched {} item(s) from {} in {} page(s)", items.len(), path, pages);
    Ok(Listing::Items(items))
}

/// Outcome for a task whose resource did not come back as data
///
/// 304 means the stored copy is current; anything else (404, 403) is final.
pub(crate) fn finish_unavailable(task: &mut Task, status: StatusCode) {
    tracing::debug!("{} for {} returned {}", task.method, task.login, status);
    task.finish(status == StatusCode::NOT_MODIFIED);
}

/// Resolves the account id of a user-scoped task's subject
///
/// Falls back to the `users` table. When the account has not been fetched
/// yet, a `user` task is queued (it sorts ahead of fan-out kinds) and the
/// task fails so it gets released and retried later. Returns `None` when the
/// account's own `user` task already finished without storing it (404), so
/// the caller can finish the task as failed.
pub(crate) fn subject_id(
    task: &Task,
    ctx: &HandlerContext<'_>,
) -> Result<Option<i64>, HandlerError> {
    if let Some(id) = task.user_id {
        return Ok(Some(id));
    }

    let login = task.login.clone();
    let root = task.root().to_string();
    let (id, lookup_finished) = ctx.with_storage(|s| {
        if let Some(id) = s.user_id_for_login(&login)? {
            return Ok((Some(id), true));
        }
        let method = TaskKind::User.method();
        match s.get_task(&login, method)? {
            Some(lookup) => Ok((None, lookup.is_finished())),
            None => {
                s.enqueue(&NewTask::new(TaskKind::User, login.as_str()).with_root(root))?;
                Ok((None, false))
            }
        }
    })?;

    match (id, lookup_finished) {
        (Some(id), _) => Ok(Some(id)),
        (None, true) => Ok(None),
        (None, false) => Err(HandlerError::SubjectUnknown(task.login.clone())),
    }
}
