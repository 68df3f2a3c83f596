use crate::handlers::payload::Account;
use crate::handlers::{
    fetch_listing, finish_unavailable, subject_id, Handler, HandlerContext, HandlerError, Listing,
};
use crate::state::{NewTask, Task, TaskKind};
use crate::storage::{GraphStore, TaskQueue};
use async_trait::async_trait;

/// Follow edges in one direction
///
/// `followers` stores `account -> subject`, `followings` stores
/// `subject -> account`. Every listed account gets a `user` task.
pub struct SocialHandler {
    kind: TaskKind,
}

impl SocialHandler {
    pub fn followers() -> Self {
        Self {
            kind: TaskKind::Followers,
        }
    }

    pub fn followings() -> Self {
        Self {
            kind: TaskKind::Followings,
        }
    }

    fn path(&self, login: &str) -> String {
        match self.kind {
            TaskKind::Followers => format!("users/{}/followers", login),
            _ => format!("users/{}/following", login),
        }
    }
}

#[async_trait]
impl Handler for SocialHandler {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    async fn process(
        &self,
        task: &mut Task,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), HandlerError> {
        let Some(subject) = subject_id(task, ctx)? else {
            tracing::warn!(
                "Account {} does not exist, finishing {} as failed",
                task.login,
                self.kind()
            );
            task.finish(false);
            return Ok(());
        };

        let path = self.path(&task.login);
        let accounts: Vec<Account> = match fetch_listing(ctx.client, &path).await? {
            Listing::Items(accounts) => accounts,
            Listing::Unavailable(status) => {
                finish_unavailable(task, status);
                return Ok(());
            }
        };

        let followers = self.kind == TaskKind::Followers;
        let root = task.root().to_string();
        ctx.with_storage(|s| {
            for account in &accounts {
                if followers {
                    s.add_following(account.id, subject)?;
                } else {
                    s.add_following(subject, account.id)?;
                }
                s.enqueue(
                    &NewTask::new(TaskKind::User, account.login.as_str())
                        .with_user_id(account.id)
                        .with_root(root.as_str()),
                )?;
            }
            Ok(())
        })?;

        tracing::debug!("{} {}: {} account(s)", task.login, self.kind, accounts.len());
        task.finish(true);
        Ok(())
    }
}
