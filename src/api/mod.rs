//! GitHub API access
//!
//! `ApiClient` issues authenticated GET requests, tracks the remaining quota
//! reported by the server, and rotates through the configured credentials
//! when one runs dry. Handlers receive an `ApiResponse` only for statuses
//! they are expected to act on.

mod client;
mod link;
mod response;

pub use client::{ApiClient, Target, RATE_REMAINING_HEADER, RATE_RESET_HEADER};
pub use link::parse_link_header;
pub use response::ApiResponse;

use thiserror::Error;

/// Errors that can occur during API access
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GET {url} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid request target '{0}': {1}")]
    InvalidTarget(String, #[source] url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
