use crate::handlers::payload::Account;
use crate::handlers::{
    fetch_listing, finish_unavailable, subject_id, Handler, HandlerContext, HandlerError, Listing,
};
use crate::state::{NewTask, Task, TaskKind};
use crate::storage::{GraphStore, TaskQueue};
use async_trait::async_trait;

/// Organization memberships of an account
///
/// Organizations are accounts too, so each gets a `user` task.
pub struct OrgsHandler;

#[async_trait]
impl Handler for OrgsHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Orgs
    }

    async fn process(
        &self,
        task: &mut Task,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), HandlerError> {
        let Some(member) = subject_id(task, ctx)? else {
            tracing::warn!(
                "Account {} does not exist, finishing {} as failed",
                task.login,
                self.kind()
            );
            task.finish(false);
            return Ok(());
        };

        let path = format!("users/{}/orgs", task.login);
        let orgs: Vec<Account> = match fetch_listing(ctx.client, &path).await? {
            Listing::Items(orgs) => orgs,
            Listing::Unavailable(status) => {
                finish_unavailable(task, status);
                return Ok(());
            }
        };

        let root = task.root().to_string();
        ctx.with_storage(|s| {
            for org in &orgs {
                s.add_org_member(org.id, member)?;
                s.enqueue(
                    &NewTask::new(TaskKind::User, org.login.as_str())
                        .with_user_id(org.id)
                        .with_root(root.as_str()),
                )?;
            }
            Ok(())
        })?;

        task.finish(true);
        Ok(())
    }
}
