//! QuickStats HTTP client
//!
//! Every call goes through [`send_with_retry`] with the client's
//! [`RetryPolicy`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::transport::{send_with_retry, shared_http_client, RetryPolicy, QUICKSTATS_BASE_URL};
use super::{QueryParameters, QuickStatsApi, QuickStatsError, QuickStatsResult, ResultHandle, TableRecord};
use crate::config::DEFAULT_API_KEY;
use crate::downloader::config::{DOWNLOAD_TIMEOUT, ENCODE_TIMEOUT, TABLE_TIMEOUT};

/// Encode endpoint path
pub const ENCODE_PATH: &str = "/uuid/encode";
/// Keyed JSON API path
pub const TABLE_PATH: &str = "/api/api_GET/";

#[derive(Debug, Deserialize)]
struct TableResponse {
    #[serde(default)]
    data: Vec<TableRecord>,
}

/// Production [`QuickStatsApi`] over HTTP
#[derive(Debug, Clone)]
pub struct QuickStatsHttpClient {
    client: Arc<Client>,
    base_url: String,
    retry: RetryPolicy,
    api_key: Option<String>,
}

impl QuickStatsHttpClient {
    /// Client against `base_url` using the given `reqwest` client
    pub fn new(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            api_key: None,
        }
    }

    /// Client on the process-wide connection pool against the public service
    pub fn shared() -> QuickStatsResult<Self> {
        Ok(Self::new(shared_http_client()?, QUICKSTATS_BASE_URL))
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the key used by the keyed JSON API
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Active retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Spreadsheet export URL for a handle
    pub fn export_url(&self, handle: &ResultHandle) -> String {
        format!("{}/data/spreadsheet/{}.csv", self.base_url, handle.as_str())
    }
}

#[async_trait]
impl QuickStatsApi for QuickStatsHttpClient {
    async fn encode_query(&self, params: &QueryParameters) -> QuickStatsResult<String> {
        let url = format!("{}{}", self.base_url, ENCODE_PATH);
        let form = params.to_form();
        let subject = format!(
            "{} {}",
            params.get("short_desc").unwrap_or_default(),
            params.get("year").unwrap_or_default()
        );

        let body = send_with_retry(self.retry, "encode", &url, subject.trim(), || {
            self.client.post(&url).form(&form).timeout(ENCODE_TIMEOUT)
        })
        .await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn download_export(&self, handle: &ResultHandle) -> QuickStatsResult<Bytes> {
        let url = self.export_url(handle);
        send_with_retry(self.retry, "download", &url, handle.as_str(), || {
            self.client.get(&url).timeout(DOWNLOAD_TIMEOUT)
        })
        .await
    }

    async fn fetch_table(&self, params: &QueryParameters) -> QuickStatsResult<Vec<TableRecord>> {
        let url = format!("{}{}", self.base_url, TABLE_PATH);
        let mut query: Vec<(&str, String)> = vec![(
            "key",
            self.api_key.clone().unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
        )];
        query.extend(params.fields().iter().map(|(name, value)| (*name, value.clone())));
        let subject = format!(
            "{} {}",
            params.get("commodity_desc").unwrap_or_default(),
            params.get("statisticcat_desc").unwrap_or_default()
        );

        let body = send_with_retry(self.retry, "table", &url, subject.trim(), || {
            self.client.get(&url).query(&query).timeout(TABLE_TIMEOUT)
        })
        .await?;

        let response: TableResponse = serde_json::from_slice(&body)
            .map_err(|e| QuickStatsError::ParseError(format!("table response: {e}")))?;
        Ok(response.data)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
