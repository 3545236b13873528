//! Shared HTTP transport
//!
//! One `reqwest::Client` is built per process and shared by every worker so
//! connection pooling spans the whole batch. The client carries the fixed
//! browser-like headers the QuickStats front end expects from its own
//! XHR calls; without them the encode endpoint answers with an HTML page.
//!
//! [`send_with_retry`] is the single retry loop for every outbound call:
//! network failures, 429 and 5xx are retried with a fixed pause up to the
//! policy's ceiling; other 4xx fail immediately. Reading the body is part of
//! the attempt, so a truncated download is retried like a dropped connection.

use bytes::Bytes;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::attempt::{AttemptFailure, FailureKind};
use super::{QuickStatsError, QuickStatsResult};
use crate::downloader::config::{MAX_TRIES, RETRY_DELAY};
use crate::metrics::{self, RequestMetrics};

/// Public QuickStats front end
pub const QUICKSTATS_BASE_URL: &str = "https://quickstats.nass.usda.gov";

/// User agent presented to QuickStats and Soil Data Access
pub const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (compatible; DataCollector/1.0)";

const ACCEPT_VALUE: &str = "application/json, text/javascript, */*; q=0.01";

/// Time to establish the TCP connection; per-call timeouts cover the rest
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

static SHARED_HTTP_CLIENT: OnceCell<Arc<Client>> = OnceCell::new();

/// Retry ceiling and fixed backoff for one logical HTTP call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Policy with the given attempt ceiling and pause
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_TRIES, RETRY_DELAY)
    }
}

/// Fixed headers sent with every request to `base_url`
pub fn default_headers(base_url: &str) -> QuickStatsResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

    let origin = base_url.trim_end_matches('/');
    let origin_value = HeaderValue::from_str(origin)
        .map_err(|e| QuickStatsError::ClientSetup(format!("invalid origin {origin}: {e}")))?;
    let referer_value = HeaderValue::from_str(&format!("{origin}/"))
        .map_err(|e| QuickStatsError::ClientSetup(format!("invalid referer {origin}/: {e}")))?;
    headers.insert(ORIGIN, origin_value);
    headers.insert(REFERER, referer_value);
    Ok(headers)
}

/// Build a client carrying the fixed headers for `base_url`
pub fn build_client(base_url: &str) -> QuickStatsResult<Client> {
    Client::builder()
        .default_headers(default_headers(base_url)?)
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| {
            QuickStatsError::ClientSetup(format!(
                "failed to build HTTP client: {e}. Check system TLS configuration."
            ))
        })
}

/// Process-wide client for the public QuickStats front end
///
/// Built on first use; later calls return the same `Arc`.
pub fn shared_http_client() -> QuickStatsResult<Arc<Client>> {
    SHARED_HTTP_CLIENT
        .get_or_try_init(|| build_client(QUICKSTATS_BASE_URL).map(Arc::new))
        .cloned()
}

/// Run one logical call, retrying transient failures
///
/// `build` is invoked once per attempt because a sent request builder is
/// consumed. Returns the full response body.
pub async fn send_with_retry<F>(
    retry: RetryPolicy,
    endpoint: &'static str,
    url: &str,
    subject: &str,
    build: F,
) -> QuickStatsResult<Bytes>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = retry.max_attempts;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let request_metrics = RequestMetrics::start(endpoint);

        let (kind, message) = match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.bytes().await {
                        Ok(body) => {
                            request_metrics.record("ok");
                            debug!(endpoint, attempt, bytes = body.len(), "Request succeeded");
                            return Ok(body);
                        }
                        Err(e) => (FailureKind::from_error(&e), e.to_string()),
                    }
                } else {
                    (FailureKind::from_status(status), format!("HTTP {status}"))
                }
            }
            Err(e) => (FailureKind::from_error(&e), e.to_string()),
        };

        request_metrics.record(kind.label());
        let failure = AttemptFailure {
            attempt,
            max_attempts,
            kind,
            message,
            subject,
            backoff: retry.backoff,
        };

        if failure.will_retry() {
            warn!(endpoint, url, "{}", failure.retry_line());
            metrics::record_retry_backoff(endpoint, retry.backoff);
            tokio::time::sleep(retry.backoff).await;
            continue;
        }

        warn!(endpoint, url, "{}", failure.final_line());
        if !kind.is_transient() {
            return Err(QuickStatsError::HttpError(failure.message));
        }
        last_error = failure.message;
    }

    Err(QuickStatsError::RetriesExhausted {
        attempts: max_attempts,
        last_error,
    })
}
