//! Shared cache stored in Redis/Valkey

use super::Cache;
use crate::error::{OpenSerpError, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Namespace prepended to every key unless configured otherwise
pub const DEFAULT_PREFIX: &str = "openserp:";

/// Cache backed by a Redis server
///
/// Entries expire server-side through `SET .. EX`. Keys are namespaced by a
/// prefix so that `clear` only touches this cache's entries. The connection
/// is opened on first use and shared afterwards.
pub struct RedisCache {
    client: redis::Client,
    prefix: String,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisCache {
    /// Create a cache for the server at `url` (e.g. `redis://127.0.0.1/`)
    pub fn new(url: &str) -> Result<Self> {
        Self::with_prefix(url, DEFAULT_PREFIX)
    }

    /// Create a cache with a custom key namespace
    pub fn with_prefix(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| OpenSerpError::cache(format!("Invalid Redis URL {}: {}", url, e)))?;

        Ok(Self {
            client,
            prefix: prefix.into(),
            connection: OnceCell::new(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn connection(&self) -> redis::RedisResult<MultiplexedConnection> {
        self.connection
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await
            .cloned()
    }
}

/// Redis expiries are whole seconds and must be positive
fn expiry_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    secs.max(1)
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redis unavailable, treating {} as a miss: {}", key, e);
                return None;
            }
        };

        let raw: Option<String> = match redis::cmd("GET")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Redis GET failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(&value)
            .map_err(|e| OpenSerpError::cache(format!("Failed to encode cache entry: {}", e)))?;

        let mut conn = self
            .connection()
            .await
            .map_err(|e| OpenSerpError::cache(format!("Redis unavailable: {}", e)))?;

        redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(payload)
            .arg("EX")
            .arg(expiry_seconds(ttl))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| OpenSerpError::cache(format!("Redis SET failed for {}: {}", key, e)))
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self
            .connection()
            .await
            .map_err(|e| OpenSerpError::cache(format!("Redis unavailable: {}", e)))?;

        let pattern = format!("{}*", self.prefix);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(|e| OpenSerpError::cache(format!("Redis SCAN failed: {}", e)))?;

            if !keys.is_empty() {
                removed += keys.len();
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, ()>(&mut conn)
                    .await
                    .map_err(|e| OpenSerpError::cache(format!("Redis DEL failed: {}", e)))?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Cleared {} Redis cache entries under {}", removed, self.prefix);
        Ok(())
    }
}
