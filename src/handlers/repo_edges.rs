use crate::handlers::payload::{Account, Contributor};
use crate::handlers::{fetch_listing, finish_unavailable, Handler, HandlerContext, HandlerError, Listing};
use crate::state::{Task, TaskKind};
use crate::storage::GraphStore;
use async_trait::async_trait;

/// Account edges of a repository: watchers, stargazers or contributors
///
/// The task subject is `owner/name` and `repo_id` must be set. A task
/// missing either can never succeed and is finished as failed.
pub struct RepoEdgesHandler {
    kind: TaskKind,
}

impl RepoEdgesHandler {
    pub fn watchers() -> Self {
        Self {
            kind: TaskKind::Watchers,
        }
    }

    pub fn stargazers() -> Self {
        Self {
            kind: TaskKind::Stargazers,
        }
    }

    pub fn contributors() -> Self {
        Self {
            kind: TaskKind::Contributors,
        }
    }

    fn resource(&self) -> &'static str {
        match self.kind {
            TaskKind::Watchers => "subscribers",
            TaskKind::Stargazers => "stargazers",
            _ => "contributors",
        }
    }
}

#[async_trait]
impl Handler for RepoEdgesHandler {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    async fn process(
        &self,
        task: &mut Task,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), HandlerError> {
        let (Some((owner, name)), Some(repo_id)) = (task.repository(), task.repo_id) else {
            tracing::warn!(
                "{} task for '{}' has no repository to fetch",
                self.kind,
                task.login
            );
            task.finish(false);
            return Ok(());
        };
        let path = format!("repos/{}/{}/{}", owner, name, self.resource());

        let count = if self.kind == TaskKind::Contributors {
            let contributors: Vec<Contributor> = match fetch_listing(ctx.client, &path).await? {
                Listing::Items(items) => items,
                Listing::Unavailable(status) => {
                    finish_unavailable(task, status);
                    return Ok(());
                }
            };
            ctx.with_storage(|s| {
                for c in &contributors {
                    s.add_contributor(repo_id, c.id, c.contributions)?;
                }
                Ok(())
            })?;
            contributors.len()
        } else {
            let accounts: Vec<Account> = match fetch_listing(ctx.client, &path).await? {
                Listing::Items(items) => items,
                Listing::Unavailable(status) => {
                    finish_unavailable(task, status);
                    return Ok(());
                }
            };
            let watchers = self.kind == TaskKind::Watchers;
            ctx.with_storage(|s| {
                for account in &accounts {
                    if watchers {
                        s.add_watcher(account.id, repo_id)?;
                    } else {
                        s.add_stargazer(account.id, repo_id)?;
                    }
                }
                Ok(())
            })?;
            accounts.len()
        };

        tracing::debug!("{} {}: {} account(s)", task.login, self.kind, count);
        task.finish(true);
        Ok(())
    }
}
