use crate::api::Target;
use crate::handlers::payload::Account;
use crate::handlers::{finish_unavailable, Handler, HandlerContext, HandlerError};
use crate::state::{NewTask, Task, TaskKind};
use crate::storage::{GraphStore, TaskQueue};
use async_trait::async_trait;
use chrono::Utc;

/// Kinds queued for every fetched account
const FOLLOW_UPS: [TaskKind; 4] = [
    TaskKind::Followers,
    TaskKind::Followings,
    TaskKind::Repos,
    TaskKind::Orgs,
];

/// Fetches an account record with a conditional request
///
/// A 304 only refreshes `crawled_at`. Fresh data replaces the stored row and
/// queues the account's fan-out tasks.
pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::User
    }

    async fn process(
        &self,
        task: &mut Task,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), HandlerError> {
        let login = task.login.clone();
        let etag = ctx.with_storage(|s| s.user_etag(&login))?;

        let path = format!("users/{}", login);
        let response = ctx.client.get(Target::Path(&path), etag.as_deref()).await?;

        if response.is_not_modified() {
            ctx.with_storage(|s| s.touch_user(&login, Utc::now()))?;
            task.finish(true);
            return Ok(());
        }
        if !response.is_fresh() {
            finish_unavailable(task, response.status());
            return Ok(());
        }

        let account: Account = response.json()?;
        let record = account.into_record(response.etag().map(str::to_string), Utc::now());
        let user_id = record.id;
        let root = task.root().to_string();

        let queued = ctx.with_storage(|s| {
            s.upsert_user(&record)?;
            let mut queued = 0;
            for kind in FOLLOW_UPS {
                let follow_up = NewTask::new(kind, record.login.as_str())
                    .with_user_id(user_id)
                    .with_root(root.as_str());
                if s.enqueue(&follow_up)? {
                    queued += 1;
                }
            }
            Ok(queued)
        })?;

        tracing::debug!("Stored account {} ({}), queued {} task(s)", login, user_id, queued);
        task.user_id = Some(user_id);
        task.finish(true);
        Ok(())
    }
}
