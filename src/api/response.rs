use crate::api::link::parse_link_header;
use crate::api::{ApiError, ApiResult};
use reqwest::header::{HeaderMap, ETAG, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A resolved API response handed back to handlers
///
/// Only statuses the client treats as outcomes reach callers: fresh data,
/// not-modified, not-found, and permission errors.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// The URL that was requested
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) async fn read(url: String, response: reqwest::Response) -> reqwest::Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            url,
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// True for 200, or 204 with an empty body
    pub fn is_fresh(&self) -> bool {
        self.status == StatusCode::OK || self.status == StatusCode::NO_CONTENT
    }

    /// True for 304: the caller's cached copy is still valid
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// True for a 403 returned while quota remained
    pub fn is_forbidden(&self) -> bool {
        self.status == StatusCode::FORBIDDEN
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    /// Pagination links keyed by relation (`next`, `last`, ...)
    pub fn links(&self) -> HashMap<String, String> {
        parse_link_header(self.headers.get(LINK).and_then(|v| v.to_str().ok()))
    }

    /// URL of the next page, if any
    pub fn next_page(&self) -> Option<String> {
        self.links().remove("next")
    }

    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body).map_err(|source| ApiError::Decode {
            url: self.url.clone(),
            source,
        })
    }

    /// Decodes a JSON array body, treating an empty body as an empty list
    pub fn json_list<T: DeserializeOwned>(&self) -> ApiResult<Vec<T>> {
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }
        self.json()
    }
}
