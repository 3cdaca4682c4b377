//! Caching module for OpenSerp-RS
//!
//! Search payloads are cached behind the [`Cache`] trait so the client can
//! run against an in-process map or a shared remote store.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::{InMemoryCache, DEFAULT_MAX_CAPACITY};
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Key-value store with per-entry expiry
///
/// Implementations must be safe to share between tasks. A failing backend
/// never aborts a search: `get` reports a miss, and `set`/`clear` return a
/// [`Cache`](crate::OpenSerpError::Cache) error that the client logs and
/// discards.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a live entry, or `None` when absent, expired or unreachable
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value, replacing any existing entry under `key`
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Remove every entry owned by this cache
    async fn clear(&self) -> Result<()>;
}
