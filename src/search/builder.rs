//! Client construction

use super::client::Client;
use crate::cache::{Cache, InMemoryCache};
use crate::config::{OutgoingSettings, Settings, DEFAULT_BASE_URL, DEFAULT_CACHE_TTL_SECS};
use crate::error::{OpenSerpError, Result};
use crate::metrics::Metrics;
use crate::network::{HttpClient, RetryPolicy};
use crate::rate_limit::{RateLimiter, TokenBucketLimiter};
use std::time::Duration;
use tracing::info;
#[cfg(not(feature = "redis"))]
use tracing::warn;

/// Builder for [`Client`]
///
/// ```no_run
/// # use openserp_rs::{Client, TokenBucketLimiter};
/// # use std::time::Duration;
/// let client = Client::builder()
///     .base_url("http://serp.internal:7000")
///     .timeout(Duration::from_secs(10))
///     .cache_ttl(Duration::from_secs(600))
///     .rate_limiter(TokenBucketLimiter::per_second(5))
///     .build()?;
/// # Ok::<(), openserp_rs::OpenSerpError>(())
/// ```
pub struct ClientBuilder {
    base_url: String,
    outgoing: OutgoingSettings,
    cache: Option<Box<dyn Cache>>,
    cache_ttl: Duration,
    rate_limiter: Option<Box<dyn RateLimiter>>,
    retry: RetryPolicy,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            outgoing: OutgoingSettings::default(),
            cache: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            rate_limiter: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Start from loaded settings
    ///
    /// Fails only if the configured Redis cache cannot be set up.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Self::new()
            .base_url(settings.server.base_url.clone())
            .outgoing(settings.outgoing.clone())
            .cache_ttl(Duration::from_secs(settings.cache.ttl));

        builder.cache = Some(cache_from_settings(settings)?);

        if let Some(ref limit) = settings.rate_limit {
            let mut limiter = TokenBucketLimiter::per_second(limit.requests_per_second);
            if let Some(burst) = limit.burst {
                limiter = limiter.with_burst(burst);
            }
            builder = builder.rate_limiter(limiter.with_mode(limit.mode));
        }

        Ok(builder)
    }

    /// Server URL, e.g. `http://localhost:7000`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-attempt network timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.outgoing.request_timeout = timeout.as_secs_f64();
        self
    }

    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.outgoing.verify_ssl = verify;
        self
    }

    /// Replace all outgoing settings, retry policy included
    pub fn outgoing(mut self, settings: OutgoingSettings) -> Self {
        self.retry = settings.retry.to_policy();
        self.outgoing = settings;
        self
    }

    pub fn cache(mut self, cache: impl Cache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn rate_limiter(mut self, limiter: impl RateLimiter + 'static) -> Self {
        self.rate_limiter = Some(Box::new(limiter));
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Create the client and its connection pool
    pub fn build(self) -> Result<Client> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| {
            OpenSerpError::validation(format!("Invalid base URL {:?}: {}", self.base_url, e))
        })?;

        let http = HttpClient::with_settings(&self.outgoing).map_err(|e| {
            OpenSerpError::connection_caused_by(format!("Failed to create HTTP client: {}", e), e)
        })?;

        info!("OpenSerp client initialized for {}", base_url);

        Ok(Client {
            http,
            base_url,
            cache: self.cache.unwrap_or_else(|| Box::new(InMemoryCache::default())),
            cache_ttl: self.cache_ttl,
            rate_limiter: self.rate_limiter,
            retry: self.retry,
            metrics: Metrics::new(),
        })
    }

    /// Create a blocking client with its own runtime
    pub fn build_blocking(self) -> Result<crate::blocking::Client> {
        crate::blocking::Client::from_async(self.build()?)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "redis")]
fn cache_from_settings(settings: &Settings) -> Result<Box<dyn Cache>> {
    match settings.redis {
        Some(ref redis) => {
            info!("Using Redis cache at {}", redis.url);
            Ok(Box::new(crate::cache::RedisCache::with_prefix(
                &redis.url,
                redis.prefix.clone(),
            )?))
        }
        None => Ok(Box::new(InMemoryCache::new(settings.cache.max_capacity))),
    }
}

#[cfg(not(feature = "redis"))]
fn cache_from_settings(settings: &Settings) -> Result<Box<dyn Cache>> {
    if settings.redis.is_some() {
        warn!("Redis cache configured but the `redis` feature is disabled, using in-memory cache");
    }
    Ok(Box::new(InMemoryCache::new(settings.cache.max_capacity)))
}
