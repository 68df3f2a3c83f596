//! Queue statistics
//!
//! Per-method task counts read from the shared queue, for the `--stats` mode.

use crate::storage::{MethodStats, StorageResult, TaskQueue};

/// Queue statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStatistics {
    /// Counts per method, ordered by method name
    pub by_method: Vec<MethodStats>,

    /// Sum over all methods
    pub totals: MethodStats,
}

impl QueueStatistics {
    /// Share of finished tasks that succeeded, in percent
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.totals.succeeded + self.totals.failed;
        if finished == 0 {
            return None;
        }
        Some(self.totals.succeeded as f64 / finished as f64 * 100.0)
    }
}

/// Loads statistics from the queue
pub fn load_statistics(queue: &dyn TaskQueue) -> StorageResult<QueueStatistics> {
    let mut by_method = queue.queue_stats()?;
    by_method.sort_by(|a, b| a.method.cmp(&b.method));

    let mut totals = MethodStats {
        method: "total".to_string(),
        ..MethodStats::default()
    };
    for m in &by_method {
        totals.pending += m.pending;
        totals.claimed += m.claimed;
        totals.succeeded += m.succeeded;
        totals.failed += m.failed;
    }

    Ok(QueueStatistics { by_method, totals })
}

/// Prints statistics to stdout as a table
pub fn print_statistics(stats: &QueueStatistics) {
    println!("=== Queue Statistics ===\n");

    println!(
        "  {:<14} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "method", "pending", "claimed", "success", "failed", "total"
    );
    for m in stats.by_method.iter().chain(std::iter::once(&stats.totals)) {
        println!(
            "  {:<14} {:>9} {:>9} {:>9} {:>9} {:>9}",
            m.method,
            m.pending,
            m.claimed,
            m.succeeded,
            m.failed,
            m.total()
        );
    }
    println!();

    match stats.success_rate() {
        Some(rate) => println!("Success rate: {:.1}%", rate),
        None => println!("Success rate: n/a (nothing finished yet)"),
    }
}
