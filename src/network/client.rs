//! HTTP client for talking to the OpenSerp server

use super::request::{ApiRequest, ApiResponse};
use super::retry::{RetryPolicy, RetryStats};
use crate::config::OutgoingSettings;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Pooled HTTP client with OpenSerp-specific configuration
///
/// Cloning is cheap and shares the connection pool. The pool is released
/// when the last clone is dropped.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    user_agent: String,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> reqwest::Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> reqwest::Result<Self> {
        let timeout = settings.timeout();
        let mut builder = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(settings.pool_maxsize)
            .gzip(true)
            .brotli(true);

        // SSL verification
        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        // Proxy settings
        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        let client = builder.build()?;

        let user_agent = match settings.useragent_suffix {
            Some(ref suffix) => format!("{} {}", default_user_agent(), suffix),
            None => default_user_agent(),
        };

        Ok(Self {
            client,
            timeout,
            user_agent,
            extra_headers: settings.extra_headers.clone(),
        })
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Send a request once
    pub async fn execute(&self, request: &ApiRequest) -> reqwest::Result<ApiResponse> {
        let mut req_builder = self
            .client
            .get(&request.url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json");

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Send a request, retrying per `policy`
    ///
    /// Retryable statuses are retried until attempts run out, after which
    /// the last response is returned as-is. Connection failures (see
    /// [`is_connection_failure`]) are retried the same way. Timeouts and any
    /// other transport error are returned immediately.
    pub async fn execute_with_retry(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> (reqwest::Result<ApiResponse>, RetryStats) {
        let max_attempts = policy.attempts();
        let mut stats = RetryStats::default();

        loop {
            let attempt = stats.attempts;
            stats.attempts += 1;
            let last_attempt = stats.attempts >= max_attempts;

            let delay = match self.execute(request).await {
                Ok(response) if !last_attempt && policy.is_retryable_status(response.status) => {
                    let delay = policy.delay_with_hint(attempt, response.retry_after());
                    warn!(
                        "Attempt {}/{} to {} returned {}. Retrying in {:?}",
                        stats.attempts, max_attempts, request.url, response.status, delay
                    );
                    delay
                }
                Err(e) if !last_attempt && is_connection_failure(&e) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} to {} failed: {}. Retrying in {:?}",
                        stats.attempts, max_attempts, request.url, e, delay
                    );
                    delay
                }
                outcome => {
                    if stats.attempts > 1 {
                        debug!("Request to {} finished after {} attempts", request.url, stats.attempts);
                    }
                    return (outcome, stats);
                }
            };

            stats.total_delay += delay;
            tokio::time::sleep(delay).await;
        }
    }

    /// Parse response into ApiResponse
    async fn parse_response(response: Response) -> reqwest::Result<ApiResponse> {
        let status = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_string(), v.to_string());
            }
        }

        let text = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            text,
            url,
        })
    }
}

/// Whether the request never got a response over a working connection
///
/// Covers refused, reset and prematurely closed connections as well as DNS
/// failures. Timeouts, redirect loops, builder and body decoding errors are
/// not connection failures.
pub fn is_connection_failure(error: &reqwest::Error) -> bool {
    !error.is_timeout() && (error.is_connect() || error.is_request())
}

fn default_user_agent() -> String {
    format!("openserp-rs/{}", crate::VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxySettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert!(client.user_agent().starts_with("openserp-rs/"));
    }

    #[tokio::test]
    async fn test_user_agent_suffix() {
        let settings = OutgoingSettings {
            useragent_suffix: Some("my-app/2.0".to_string()),
            ..Default::default()
        };
        let client = HttpClient::with_settings(&settings).unwrap();
        assert!(client.user_agent().ends_with(" my-app/2.0"));
    }

    #[tokio::test]
    async fn test_invalid_proxy_is_rejected() {
        let settings = OutgoingSettings {
            proxies: ProxySettings {
                all: Some("::not a proxy::".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(HttpClient::with_settings(&settings).is_err());
    }

    #[tokio::test]
    async fn test_dropped_connections_are_retried() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));

        let counter = accepts.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let client = HttpClient::new().unwrap();
        let policy = RetryPolicy::new().with_base_delay(Duration::from_millis(5));
        let request = ApiRequest::get(format!("http://{}/mega/search", addr));

        let (result, stats) = client.execute_with_retry(&request, &policy).await;

        let err = result.unwrap_err();
        assert!(is_connection_failure(&err));
        assert!(!err.is_timeout());
        assert_eq!(stats.attempts, 3);
        assert_eq!(accepts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_failures_are_retried() {
        let client = HttpClient::new().unwrap();
        let policy = RetryPolicy::new().with_base_delay(Duration::from_millis(5));
        // Nothing listens on port 1
        let request = ApiRequest::get("http://127.0.0.1:1/engines");

        let (result, stats) = client.execute_with_retry(&request, &policy).await;

        assert!(result.unwrap_err().is_connect());
        assert_eq!(stats.attempts, 3);
        // 5ms then 10ms of backoff
        assert!(stats.total_delay >= Duration::from_millis(14));
        assert!(stats.total_delay <= Duration::from_millis(16));
    }
}
