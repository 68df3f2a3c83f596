//! Task definitions for the shared crawl queue
//!
//! A task names a subject (`login`) and an operation (`method`). The pair is
//! unique in the queue; the claim fields record which worker owns it.

use chrono::{DateTime, Utc};
use std::fmt;

/// The operations a task can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Fetch the account record itself
    User,

    /// Accounts the subject follows
    Followings,

    /// Accounts following the subject
    Followers,

    /// Contributors of a repository, with commit counts
    Contributors,

    /// Repositories owned by the subject
    Repos,

    /// Organizations the subject belongs to
    Orgs,

    /// Accounts watching a repository
    Watchers,

    /// Accounts that starred a repository
    Stargazers,
}

impl TaskKind {
    /// The `method` string stored in the queue
    pub fn method(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Followings => "followings",
            Self::Followers => "followers",
            Self::Contributors => "contributors",
            Self::Repos => "repos",
            Self::Orgs => "orgs",
            Self::Watchers => "watchers",
            Self::Stargazers => "stargazers",
        }
    }

    /// The `task_type` category new tasks of this kind are created with
    pub fn task_type(&self) -> i64 {
        match self {
            Self::User => 1,
            Self::Followings => 2,
            Self::Followers => 3,
            Self::Contributors => 4,
            Self::Repos => 5,
            Self::Orgs => 6,
            Self::Watchers => 7,
            Self::Stargazers => 8,
        }
    }

    /// Returns all task kinds
    pub fn all() -> [Self; 8] {
        [
            Self::User,
            Self::Followings,
            Self::Followers,
            Self::Contributors,
            Self::Repos,
            Self::Orgs,
            Self::Watchers,
            Self::Stargazers,
        ]
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}

/// A row of the `queue` table
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: i64,
    pub login: String,
    pub user_id: Option<i64>,
    pub reponame: Option<String>,
    pub repo_id: Option<i64>,
    pub root_login: Option<String>,
    pub task_type: i64,
    pub method: String,

    /// Worker identity holding the claim, unset while claimable
    pub assignee: Option<String>,
    pub assigned_dt: Option<DateTime<Utc>>,

    pub completed_dt: Option<DateTime<Utc>>,
    /// Outcome: unset until a handler finishes the task
    pub success: Option<bool>,
}

impl Task {
    /// Records the outcome a handler reached
    ///
    /// The worker persists these two fields when the handler returns.
    pub fn finish(&mut self, success: bool) {
        self.success = Some(success);
        self.completed_dt = Some(Utc::now());
    }

    /// Returns true if no worker holds this task
    pub fn is_claimable(&self) -> bool {
        self.assignee.is_none()
    }

    /// Returns true once an outcome has been recorded
    pub fn is_finished(&self) -> bool {
        self.success.is_some() && self.completed_dt.is_some()
    }

    /// Splits a repository subject `owner/name` into its parts
    pub fn repository(&self) -> Option<(&str, &str)> {
        let (owner, name) = self.login.split_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some((owner, name))
    }

    /// The login that discovered tasks should carry as their root
    pub fn root(&self) -> &str {
        self.root_login.as_deref().unwrap_or(&self.login)
    }
}

/// A task to be inserted by a producer
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub login: String,
    pub user_id: Option<i64>,
    pub reponame: Option<String>,
    pub repo_id: Option<i64>,
    pub root_login: Option<String>,
    pub task_type: i64,
    pub method: String,
}

impl NewTask {
    /// Creates a task of the given kind with its default task type
    pub fn new(kind: TaskKind, login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            user_id: None,
            reponame: None,
            repo_id: None,
            root_login: None,
            task_type: kind.task_type(),
            method: kind.method().to_string(),
        }
    }

    /// Creates a repository-scoped task for `owner/name`
    pub fn for_repository(kind: TaskKind, owner: &str, name: &str, repo_id: i64) -> Self {
        let mut task = Self::new(kind, format!("{}/{}", owner, name));
        task.reponame = Some(name.to_string());
        task.repo_id = Some(repo_id);
        task
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_root(mut self, root_login: impl Into<String>) -> Self {
        self.root_login = Some(root_login.into());
        self
    }

    pub fn with_task_type(mut self, task_type: i64) -> Self {
        self.task_type = task_type;
        self
    }
}
