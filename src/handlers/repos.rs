use crate::api::Target;
use crate::handlers::payload::Repository;
use crate::handlers::{fetch_listing, finish_unavailable, Handler, HandlerContext, HandlerError, Listing};
use crate::state::{NewTask, Task, TaskKind};
use crate::storage::{GraphStore, TaskQueue};
use async_trait::async_trait;
use chrono::Utc;

const REPO_FOLLOW_UPS: [TaskKind; 3] = [
    TaskKind::Watchers,
    TaskKind::Stargazers,
    TaskKind::Contributors,
];

/// Stores an account's repositories and queues their edge tasks
///
/// Listings carry no `parent`, so each fork is looked up individually to
/// record whose repository it was forked from.
pub struct ReposHandler;

#[async_trait]
impl Handler for ReposHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Repos
    }

    async fn process(
        &self,
        task: &mut Task,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), HandlerError> {
        let path = format!("users/{}/repos", task.login);
        let mut repos: Vec<Repository> = match fetch_listing(ctx.client, &path).await? {
            Listing::Items(repos) => repos,
            Listing::Unavailable(status) => {
                finish_unavailable(task, status);
                return Ok(());
            }
        };

        for repo in repos.iter_mut().filter(|r| r.fork && r.parent.is_none()) {
            let path = format!("repos/{}/{}", repo.owner.login, repo.name);
            let detail = ctx.client.get(Target::Path(&path), None).await?;
            if detail.is_fresh() {
                repo.parent = detail.json::<Repository>()?.parent;
            } else {
                tracing::debug!("No parent for fork {}: status {}", path, detail.status());
            }
        }

        let root = task.root().to_string();
        let crawled_at = Utc::now();
        ctx.with_storage(|s| {
            for repo in &repos {
                s.upsert_repo(&repo.to_record(crawled_at))?;
                for kind in REPO_FOLLOW_UPS {
                    s.enqueue(
                        &NewTask::for_repository(kind, &repo.owner.login, &repo.name, repo.id)
                            .with_user_id(repo.owner.id)
                            .with_root(root.as_str()),
                    )?;
                }
            }
            Ok(())
        })?;

        tracing::debug!("{}: {} repositories", task.login, repos.len());
        task.finish(true);
        Ok(())
    }
}
