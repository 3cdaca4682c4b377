//! Settings structures for OpenSerp-RS configuration

use crate::network::{RetryPolicy, DEFAULT_RETRY_STATUSES};
use crate::rate_limit::LimitMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default OpenSerp server
pub const DEFAULT_BASE_URL: &str = "http://localhost:7000";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cache time-to-live in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Main settings structure, as read from `openserp.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    pub cache: CacheSettings,
    pub rate_limit: Option<RateLimitSettings>,
    pub redis: Option<RedisSettings>,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (OPENSERP_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|name| std::env::var(name).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("OPENSERP_BASE_URL") {
            self.server.base_url = val;
        }
        if let Some(val) = var("OPENSERP_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                self.outgoing.request_timeout = timeout;
            }
        }
        if let Some(val) = var("OPENSERP_VERIFY_SSL") {
            if let Ok(verify) = val.parse() {
                self.outgoing.verify_ssl = verify;
            }
        }
        if let Some(val) = var("OPENSERP_CACHE_TTL") {
            if let Ok(ttl) = val.parse() {
                self.cache.ttl = ttl;
            }
        }
        if let Some(val) = var("OPENSERP_REDIS_URL") {
            self.redis.get_or_insert_with(RedisSettings::default).url = val;
        }
        if let Some(val) = var("OPENSERP_REQUESTS_PER_SECOND") {
            if let Ok(rps) = val.parse() {
                self.rate_limit
                    .get_or_insert_with(RateLimitSettings::default)
                    .requests_per_second = rps;
            }
        }
    }
}

/// Remote server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL of the OpenSerp server
    pub base_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Request timeout in seconds, applied to each attempt
    pub request_timeout: f64,
    /// Extra text appended to the User-Agent
    pub useragent_suffix: Option<String>,
    /// Idle connections kept per host
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
    /// Retry behavior
    pub retry: RetrySettings,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TIMEOUT_SECS as f64,
            useragent_suffix: None,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
            retry: RetrySettings::default(),
        }
    }
}

impl OutgoingSettings {
    /// Request timeout; zero, negative and invalid values fall back to the
    /// default
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// First backoff delay in seconds, doubled for each retry
    pub backoff_factor: f64,
    /// Backoff cap in seconds
    pub max_backoff: f64,
    /// Randomize backoff delays
    pub jitter: bool,
    /// Statuses that trigger a retry
    pub status_forcelist: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 1.0,
            max_backoff: 60.0,
            jitter: false,
            status_forcelist: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::try_from_secs_f64(self.backoff_factor)
                .unwrap_or(defaults.base_delay),
            max_delay: Duration::try_from_secs_f64(self.max_backoff).unwrap_or(defaults.max_delay),
            jitter: self.jitter,
            retry_statuses: self.status_forcelist.clone(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Time-to-live in seconds
    pub ttl: u64,
    /// Maximum number of in-memory entries
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL_SECS,
            max_capacity: crate::cache::DEFAULT_MAX_CAPACITY,
        }
    }
}

/// Client-side rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub requests_per_second: u32,
    /// Bucket size; defaults to `requests_per_second`
    pub burst: Option<u32>,
    pub mode: LimitMode,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            burst: None,
            mode: LimitMode::Block,
        }
    }
}

/// Redis/Valkey settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
    /// Namespace prepended to every cache key
    pub prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/".to_string(),
            prefix: "openserp:".to_string(),
        }
    }
}
