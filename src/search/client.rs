//! Search pipeline: validation, admission, cache, transport, error mapping

use super::builder::ClientBuilder;
use super::models::{EnginesResponse, SearchRequest};
use crate::cache::Cache;
use crate::config::Settings;
use crate::error::{ErrorCode, OpenSerpError, Result};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::network::{is_connection_failure, ApiRequest, ApiResponse, HttpClient, RetryPolicy};
use crate::rate_limit::RateLimiter;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Search endpoint, relative to the base URL
pub const SEARCH_PATH: &str = "/mega/search";

/// Engine listing endpoint, relative to the base URL
pub const ENGINES_PATH: &str = "/engines";

/// Asynchronous OpenSerp client
///
/// Owns its connection pool, cache, optional rate limiter and metrics.
/// The client is `Send + Sync`; wrap it in an `Arc` to share it between
/// tasks.
pub struct Client {
    pub(super) http: HttpClient,
    pub(super) base_url: String,
    pub(super) cache: Box<dyn Cache>,
    pub(super) cache_ttl: Duration,
    pub(super) rate_limiter: Option<Box<dyn RateLimiter>>,
    pub(super) retry: RetryPolicy,
    pub(super) metrics: Metrics,
}

impl Client {
    /// Client for `http://localhost:7000` with default settings
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Build a client from loaded settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        ClientBuilder::from_settings(settings)?.build()
    }

    /// Run a search
    ///
    /// Validates the request, waits for the rate limiter, then serves the
    /// payload from cache or fetches it from the server. Fetched payloads
    /// are cached. Cache failures never fail the search.
    pub async fn search(&self, request: &SearchRequest) -> Result<Value> {
        self.metrics.inc_search();

        let result = self.run_search(request).await;
        if result.is_err() {
            self.metrics.record_failure();
        }
        result
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Value> {
        request.validate()?;

        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await?;
        }

        let key = request.cache_key();
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Cache hit for {}", key);
            self.metrics.record_cache_hit();
            return Ok(cached);
        }
        self.metrics.record_cache_miss();

        let api_request = request.to_api_request(self.endpoint(SEARCH_PATH));
        debug!("Searching '{}' with {} params", request.text, api_request.params.len());

        let (outcome, stats) = self.http.execute_with_retry(&api_request, &self.retry).await;
        self.metrics.record_exchange(stats.attempts);

        let response = outcome.map_err(|e| self.transport_error(e))?;
        let payload = Self::search_payload(response)?;

        if let Err(e) = self.cache.set(&key, payload.clone(), self.cache_ttl).await {
            warn!("Failed to cache result for {}: {}", key, e);
        }

        Ok(payload)
    }

    /// List the engines the server knows about
    ///
    /// Not cached and not rate limited. Every failure is reported as a
    /// connection error.
    pub async fn list_engines(&self) -> Result<Vec<String>> {
        let result = self.fetch_engines().await;
        if result.is_err() {
            self.metrics.record_failure();
        }
        result
    }

    async fn fetch_engines(&self) -> Result<Vec<String>> {
        let request = ApiRequest::get(self.endpoint(ENGINES_PATH));

        let (outcome, stats) = self.http.execute_with_retry(&request, &self.retry).await;
        self.metrics.record_exchange(stats.attempts);

        let response = outcome.map_err(|e| {
            OpenSerpError::connection_caused_by(format!("Failed to fetch engines: {}", e), e)
        })?;

        if !response.is_success() {
            return Err(OpenSerpError::connection(format!(
                "Failed to fetch engines: HTTP {} from {}",
                response.status, response.url
            )));
        }

        let parsed: EnginesResponse = response.json().map_err(|e| {
            OpenSerpError::connection_caused_by(format!("Failed to fetch engines: {}", e), e)
        })?;

        Ok(parsed.engines)
    }

    /// Remove every cached search result
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await
    }

    /// Release the connection pool
    ///
    /// Consuming the client makes a second release impossible. Dropping the
    /// client has the same effect.
    pub fn close(self) {
        debug!("Closing OpenSerp client for {}", self.base_url);
    }

    /// The cache this client reads and writes
    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-attempt network timeout
    pub fn timeout(&self) -> Duration {
        self.http.timeout()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map the final response of a search to its payload
    fn search_payload(response: ApiResponse) -> Result<Value> {
        if response.is_rate_limited() {
            return Err(OpenSerpError::connection("Rate limited by OpenSerp server")
                .with_error_code(ErrorCode::RateLimit));
        }
        if response.status >= 400 {
            return Err(OpenSerpError::Api {
                message: format!("API error: {}", response.text),
                status_code: response.status,
            });
        }

        response.json().map_err(|e| {
            OpenSerpError::connection_caused_by(format!("Request error: invalid JSON response: {}", e), e)
                .with_error_code(ErrorCode::InvalidResponse)
        })
    }

    /// Map a transport failure that survived the retry policy
    fn transport_error(&self, error: reqwest::Error) -> OpenSerpError {
        if error.is_timeout() {
            let timeout = self.http.timeout();
            return OpenSerpError::Timeout {
                message: format!("Request timeout after {:?}", timeout),
                timeout,
            };
        }
        if is_connection_failure(&error) {
            return OpenSerpError::connection_caused_by(
                format!("Failed to connect to {}", self.base_url),
                error,
            );
        }

        let message = format!("Request error: {}", error);
        OpenSerpError::connection_caused_by(message, error)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("timeout", &self.http.timeout())
            .field("cache_ttl", &self.cache_ttl)
            .field("retry", &self.retry)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn response(status: u16, text: &str) -> ApiResponse {
        ApiResponse {
            status,
            headers: HashMap::new(),
            text: text.to_string(),
            url: "http://localhost:7000/mega/search".to_string(),
        }
    }

    #[test]
    fn test_payload_is_returned_unchanged() {
        let payload = Client::search_payload(response(200, r#"{"results": [], "total": 0}"#)).unwrap();
        assert_eq!(payload, serde_json::json!({"results": [], "total": 0}));
    }

    #[test]
    fn test_429_is_coded_connection_error() {
        let err = Client::search_payload(response(429, "slow down")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.code(), Some(ErrorCode::RateLimit));
    }

    #[test]
    fn test_client_errors_are_api_errors() {
        let err = Client::search_payload(response(400, "bad engine")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.message(), "API error: bad engine");
    }

    #[test]
    fn test_invalid_json() {
        let err = Client::search_payload(response(200, "<html>")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.code(), Some(ErrorCode::InvalidResponse));
    }

    #[tokio::test]
    async fn test_default_client() {
        let client = Client::new().unwrap();
        assert_eq!(client.base_url(), "http://localhost:7000");
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert_eq!(client.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(client.retry_policy().attempts(), 3);
        assert!(!client.has_rate_limiter());
        assert_eq!(client.endpoint(SEARCH_PATH), "http://localhost:7000/mega/search");
        client.close();
    }
}
