//! Crawler module: the worker side of the shared queue
//!
//! This module contains the claim loop, the scoped claim guard and the
//! worker state machine that dispatches claimed tasks to handlers.

mod guard;
mod queue;
mod worker;

pub use guard::ClaimGuard;
pub use queue::claim_next;
pub use worker::{StepOutcome, Worker, WorkerStats};

/// Worker identity used as the queue `assignee`: `gh_<host>_<pid>`
pub fn default_worker_id() -> String {
    worker_id_for(&hostname(), std::process::id())
}

fn worker_id_for(host: &str, pid: u32) -> String {
    format!("gh_{}_{}", host.replace('.', "_"), pid)
}

fn hostname() -> String {
    if let Ok(host) = std::env::var("HOSTNAME") {
        let host = host.trim();
        if !host.is_empty() {
            return host.to_string();
        }
    }

    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
