//! Rate-limit-aware API client
//!
//! # Request Flow
//!
//! | Outcome | Action |
//! |---------|--------|
//! | 200 / 204 / 304 | Return to caller |
//! | 404 | Return to caller |
//! | 403, quota exhausted | Rotate credential, retry without spending budget |
//! | 403, quota remaining | Return to caller (permission error) |
//! | Other status | Spend one unit of retry budget |
//! | Transport error | Spend one unit of retry budget |
//!
//! A missing quota header counts as zero remaining, so a 403 without one
//! rotates instead of being mistaken for a permission error.

use crate::api::response::ApiResponse;
use crate::api::{ApiError, ApiResult};
use crate::config::ApiConfig;
use crate::state::CredentialPool;
use chrono::Utc;
use reqwest::header::{HeaderMap, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Header carrying the requests left for the active credential
pub const RATE_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the epoch second at which the quota resets
pub const RATE_RESET_HEADER: &str = "x-ratelimit-reset";

/// What to request: a full URL (e.g. a pagination link) or a path relative to
/// the API base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Url(&'a str),
    Path(&'a str),
}

/// Authenticated GET client with credential rotation and bounded retry
pub struct ApiClient {
    http: Client,
    base_url: Url,
    credentials: CredentialPool,
    remaining_requests: u32,
    rate_reset: Option<i64>,
    retry: u32,
    retry_delay: Duration,
    exhausted_pool_pause: Duration,
}

impl ApiClient {
    /// Builds a client from API configuration and a credential pool
    pub fn new(config: &ApiConfig, credentials: CredentialPool) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(ApiError::Client)?;

        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidTarget(config.base_url.clone(), e))?;
        // Without a trailing slash, join() would replace the last segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            credentials,
            remaining_requests: 0,
            rate_reset: None,
            retry: config.retry.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            exhausted_pool_pause: Duration::from_secs(config.exhausted_pool_pause),
        })
    }

    /// Quota remaining as of the last response; advisory only
    pub fn remaining_requests(&self) -> u32 {
        self.remaining_requests
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    /// Username of the credential the next request will use
    pub fn active_username(&self) -> &str {
        &self.credentials.current().username
    }

    /// Resolves a request target to an absolute URL
    pub fn resolve(&self, target: Target<'_>) -> ApiResult<Url> {
        match target {
            Target::Url(url) => {
                Url::parse(url).map_err(|e| ApiError::InvalidTarget(url.to_string(), e))
            }
            Target::Path(path) => self
                .base_url
                .join(path.trim_start_matches('/'))
                .map_err(|e| ApiError::InvalidTarget(path.to_string(), e)),
        }
    }

    /// Issues an authenticated GET
    ///
    /// `etag`, when given, is sent as `If-None-Match` so an unchanged resource
    /// comes back as 304.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Exhausted` once the retry budget is spent on
    /// transport failures or unexpected statuses.
    pub async fn get(&mut self, target: Target<'_>, etag: Option<&str>) -> ApiResult<ApiResponse> {
        let url = self.resolve(target)?;
        let mut budget = self.retry;
        let mut failures = 0u32;
        let mut exhausted_in_cycle = 0usize;
        let mut last_error = String::new();

        while budget > 0 {
            let credential = self.credentials.current();
            let mut request = self
                .http
                .get(url.clone())
                .basic_auth(&credential.username, Some(&credential.password));
            if let Some(tag) = etag {
                request = request.header(IF_NONE_MATCH, tag);
            }

            tracing::trace!("GET {} as {}", url, credential.username);

            let failure = match request.send().await {
                Ok(response) => {
                    self.record_rate(response.headers());
                    let status = response.status();

                    match status {
                        StatusCode::OK
                        | StatusCode::NO_CONTENT
                        | StatusCode::NOT_MODIFIED
                        | StatusCode::NOT_FOUND => {
                            match ApiResponse::read(url.to_string(), response).await {
                                Ok(resolved) => return Ok(resolved),
                                Err(e) => format!("failed to read body: {}", e),
                            }
                        }
                        StatusCode::FORBIDDEN if self.remaining_requests == 0 => {
                            exhausted_in_cycle += 1;
                            if exhausted_in_cycle >= self.credentials.len() {
                                self.pause_for_reset().await;
                                exhausted_in_cycle = 0;
                            }
                            self.credentials.rotate();
                            continue;
                        }
                        StatusCode::FORBIDDEN => {
                            match ApiResponse::read(url.to_string(), response).await {
                                Ok(resolved) => return Ok(resolved),
                                Err(e) => format!("failed to read body: {}", e),
                            }
                        }
                        other => format!("unexpected status {}", other),
                    }
                }
                Err(e) => format!("request failed: {}", e),
            };

            budget -= 1;
            failures += 1;
            tracing::warn!(
                "GET {} failed ({}), {} attempt(s) left",
                url,
                failure,
                budget
            );
            last_error = failure;

            if budget > 0 && !self.retry_delay.is_zero() {
                let factor = 1u32 << (failures - 1).min(10);
                tokio::time::sleep(self.retry_delay.saturating_mul(factor)).await;
            }
        }

        Err(ApiError::Exhausted {
            url: url.to_string(),
            attempts: failures,
            last_error,
        })
    }

    fn record_rate(&mut self, headers: &HeaderMap) {
        self.remaining_requests = headers
            .get(RATE_REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        self.rate_reset = headers
            .get(RATE_RESET_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
    }

    /// Waits once every credential has been seen exhausted within one request
    async fn pause_for_reset(&self) {
        let pause = pool_pause(self.exhausted_pool_pause, self.rate_reset, Utc::now().timestamp());
        if pause.is_zero() {
            return;
        }
        tracing::warn!(
            "All {} credential(s) exhausted, pausing {:?}",
            self.credentials.len(),
            pause
        );
        tokio::time::sleep(pause).await;
    }
}

/// Pause length after a full rotation cycle: the configured pause, shortened
/// to the quota reset time when that is sooner
fn pool_pause(configured: Duration, reset_at: Option<i64>, now: i64) -> Duration {
    match reset_at {
        Some(reset) if reset > now => {
            let until_reset = Duration::from_secs((reset - now) as u64);
            configured.min(until_reset)
        }
        _ => configured,
    }
}
