//! USDA NASS QuickStats access
//!
//! QuickStats serves spreadsheet exports through a two-step protocol: a
//! form-encoded query is posted to `/uuid/encode`, which answers with an
//! opaque handle, and the handle is then exchanged for CSV at
//! `/data/spreadsheet/{handle}.csv`. A separate keyed JSON API
//! (`/api/api_GET/`) returns whole tables in one request.
//!
//! [`QuickStatsApi`] is the seam between the orchestration in
//! [`crate::downloader`] and the network; [`QuickStatsHttpClient`] is the
//! production implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::output::path::SEPARATOR;

pub mod attempt;
pub mod http;
pub mod query;
pub mod transport;

pub use http::QuickStatsHttpClient;
pub use query::{candidate_descriptions, QueryParameters};
pub use transport::{build_client, send_with_retry, RetryPolicy};

/// QuickStats access errors
#[derive(Debug, thiserror::Error)]
pub enum QuickStatsError {
    /// Non-retryable HTTP status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Connection, timeout or body read failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    ParseError(String),

    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },

    /// HTTP client could not be constructed
    #[error("client setup error: {0}")]
    ClientSetup(String),
}

/// Result type for QuickStats operations
pub type QuickStatsResult<T> = Result<T, QuickStatsError>;

/// One row of a keyed-API table response
pub type TableRecord = serde_json::Map<String, serde_json::Value>;

/// Opaque identifier returned by the encode endpoint
///
/// Used verbatim as a URL path segment and as part of the cache filename,
/// so anything that could escape either is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultHandle(String);

impl ResultHandle {
    /// Parse an encode response body, which is either bare or JSON-quoted
    ///
    /// Returns `None` for an empty body or one that does not look like an
    /// identifier (whitespace, markup, quotes or path separators inside).
    /// The cache filename separator `__` is rejected too, since a handle
    /// carrying it would not parse back out of its export's name.
    pub fn parse(body: &str) -> Option<Self> {
        let handle = body.trim().trim_matches('"').trim();
        if handle.is_empty() {
            return None;
        }
        let malformed = handle.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '<' | '>' | '"' | '\'' | '/' | '\\' | '{' | '}' | '?' | '#' | '%')
        });
        if malformed || handle.contains("..") || handle.contains(SEPARATOR) {
            return None;
        }
        Some(Self(handle.to_string()))
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network operations the downloader needs from QuickStats
#[async_trait]
pub trait QuickStatsApi: Send + Sync {
    /// Post a breadcrumb-ordered query to the encode endpoint
    ///
    /// Returns the raw response body; interpreting it is the caller's job.
    /// Transport failures have already been retried when this returns `Err`.
    async fn encode_query(&self, params: &QueryParameters) -> QuickStatsResult<String>;

    /// Download the CSV export behind a handle
    async fn download_export(&self, handle: &ResultHandle) -> QuickStatsResult<Bytes>;

    /// Query the keyed JSON API and return its `data` rows
    async fn fetch_table(&self, params: &QueryParameters) -> QuickStatsResult<Vec<TableRecord>>;

    /// Base URL requests are sent to
    fn base_url(&self) -> &str;
}
