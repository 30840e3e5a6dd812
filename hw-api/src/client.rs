//! HTTP client for the backend REST API.
//!
//! Handles base URL composition, timeout management, status checking and
//! response decoding for the history endpoints.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use hw_core::config::{AppConfig, BackendConfig};
use hw_core::constants::endpoints;
use hw_core::error::{HwError, HwResult};
use hw_models::{BackendEvent, NewsArticle};

use crate::normalize::decode_records;

/// HTTP client for the backend history endpoints.
///
/// Wraps reqwest::Client with base URL handling and error classification.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://example.com/api").
    api_base: String,
    /// Per-request timeout.
    timeout: Duration,
}

impl ApiClient {
    /// Create a new ApiClient from backend configuration.
    pub fn new(config: &BackendConfig) -> HwResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| HwError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            api_base: AppConfig::sanitize_base_url(&config.api_base),
            timeout,
        })
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Execute a GET request and check its status.
    pub async fn get(&self, path: &str) -> HwResult<Response> {
        let url = self.url(path);
        debug!("GET {url}");

        let response = self
            .inner
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Self::classify_error)?;

        Self::check_status(response).await
    }

    /// GET + decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> HwResult<T> {
        let response = self.get(path).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HwError::Serialization(format!("failed to parse response from {path}: {e}")))
    }

    /// Fetch historical events, newest first as served by the backend.
    pub async fn events(&self) -> HwResult<Vec<BackendEvent>> {
        let records: Vec<serde_json::Value> = self.get_json(endpoints::EVENTS).await?;
        let events = decode_records(records, None);
        debug!("fetched {} historical events", events.len());
        Ok(events)
    }

    /// Fetch historical insights, newest first as served by the backend.
    pub async fn insights(&self) -> HwResult<Vec<BackendEvent>> {
        let records: Vec<serde_json::Value> = self.get_json(endpoints::INSIGHTS).await?;
        let insights = decode_records(records, Some("insight"));
        debug!("fetched {} historical insights", insights.len());
        Ok(insights)
    }

    /// Fetch news articles.
    pub async fn news(&self) -> HwResult<Vec<NewsArticle>> {
        self.get_json(endpoints::NEWS).await
    }

    /// Check the HTTP status code and convert to HwError if needed.
    async fn check_status(response: Response) -> HwResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        } else {
            body
        };

        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            return Err(HwError::Timeout(format!("server returned {status}")));
        }
        Err(HwError::ServerError {
            status: status.as_u16(),
            message,
        })
    }

    /// Classify a reqwest error into a HwError variant.
    fn classify_error(e: reqwest::Error) -> HwError {
        if e.is_timeout() {
            HwError::Timeout(e.to_string())
        } else if e.is_connect() {
            HwError::Http(format!("connection failed: {e}"))
        } else {
            HwError::Http(e.to_string())
        }
    }
}
