use crate::state::Credential;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

/// Worker loop timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Seconds to sleep when the queue has nothing claimable
    #[serde(rename = "idle-time")]
    pub idle_time: u64,

    /// Milliseconds to wait after losing a claim race
    #[serde(rename = "claim-backoff-ms")]
    pub claim_backoff_ms: u64,

    /// Seconds to wait after a task was released on failure
    #[serde(rename = "failure-backoff")]
    pub failure_backoff: u64,
}

impl CrawlerConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_time)
    }

    pub fn claim_backoff(&self) -> Duration {
        Duration::from_millis(self.claim_backoff_ms)
    }

    pub fn failure_pause(&self) -> Duration {
        Duration::from_secs(self.failure_backoff)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            idle_time: 10,
            claim_backoff_ms: 1000,
            failure_backoff: 5,
        }
    }
}

/// API client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL that relative request paths are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Attempts allowed per request before giving up
    pub retry: u32,

    /// Delay before the first transient retry, doubled on each further attempt
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Seconds to pause once every credential has been seen exhausted
    #[serde(rename = "exhausted-pool-pause")]
    pub exhausted_pool_pause: u64,

    /// Total request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com/".to_string(),
            retry: 3,
            retry_delay_ms: 500,
            exhausted_pool_pause: 60,
            timeout_secs: 30,
            user_agent: concat!("devrank-crawler/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the shared SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Priority bucketing for queue ordering
///
/// Task types listed in `collapsed_types` share the single bucket
/// `collapsed_bucket`; every other type is its own bucket. Lower buckets are
/// claimed first, oldest task first within a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    #[serde(rename = "collapsed-types")]
    pub collapsed_types: Vec<i64>,

    #[serde(rename = "collapsed-bucket")]
    pub collapsed_bucket: i64,
}

impl PriorityConfig {
    /// Returns the priority bucket for a task type
    pub fn bucket(&self, task_type: i64) -> i64 {
        if self.collapsed_types.contains(&task_type) {
            self.collapsed_bucket
        } else {
            task_type
        }
    }

    /// SQL expression computing the bucket of a `queue` row
    ///
    /// Only integers are interpolated, so the expression is safe to embed.
    pub fn bucket_sql(&self) -> String {
        if self.collapsed_types.is_empty() {
            return "task_type".to_string();
        }
        let types = self
            .collapsed_types
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CASE WHEN task_type IN ({}) THEN {} ELSE task_type END",
            types, self.collapsed_bucket
        )
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            collapsed_types: vec![2, 3, 4],
            collapsed_bucket: 3,
        }
    }
}
