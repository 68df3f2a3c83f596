//! DevRank crawler: a distributed crawl engine for the GitHub API
//!
//! Many independent worker processes share one task queue stored in SQLite.
//! Each worker claims a task with a compare-and-swap update, dispatches it to
//! the handler registered for its method, and either completes it or releases
//! it back to the queue. API access goes through a rate-limit-aware client that
//! rotates credentials when quota runs out.

pub mod api;
pub mod config;
pub mod crawler;
pub mod handlers;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Handler error: {0}")]
    Handler(#[from] handlers::HandlerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use api::{ApiClient, ApiResponse, Target};
pub use config::Config;
pub use crawler::Worker;
pub use state::{Credential, CredentialPool, NewTask, Task, TaskKind};
pub use storage::SqliteStorage;
