//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use devrank_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Idle interval: {}s", config.crawler.idle_time);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, CrawlerConfig, PriorityConfig, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
