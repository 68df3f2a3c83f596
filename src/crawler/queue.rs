use crate::config::PriorityConfig;
use crate::state::Task;
use crate::storage::{lock_storage, ClaimAttempt, SharedStorage, StorageResult, TaskQueue};
use chrono::Utc;
use std::time::Duration;

/// Claims the best available task, retrying after lost races
///
/// Returns `None` when nothing is claimable. Each lost race means another
/// worker took the candidate, so the next attempt sees a different one.
pub async fn claim_next(
    storage: &SharedStorage,
    worker_id: &str,
    priority: &PriorityConfig,
    backoff: Duration,
) -> StorageResult<Option<Task>> {
    let mut races = 0u32;

    loop {
        let attempt = {
            let mut storage = lock_storage(storage)?;
            storage.try_claim(worker_id, priority, Utc::now())?
        };

        match attempt {
            ClaimAttempt::Claimed(task) => return Ok(Some(task)),
            ClaimAttempt::Empty => return Ok(None),
            ClaimAttempt::RaceLost => {
                races += 1;
                tracing::debug!("Lost claim race ({} so far), retrying", races);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
