//! In-process cache backed by moka

use super::Cache;
use crate::error::Result;
use async_trait::async_trait;
use moka::ops::compute::Op;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default number of entries kept before moka starts evicting
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }
}

/// Thread-safe in-memory cache with lazy expiry
///
/// Each entry carries its own deadline, checked on read. Expired entries are
/// dropped by the lookup that finds them, unless a newer write has already
/// replaced them.
pub struct InMemoryCache {
    entries: moka::future::Cache<String, CacheEntry>,
}

impl InMemoryCache {
    /// Create a cache holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        let entries = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .build();

        Self { entries }
    }

    /// Remove a single entry
    pub async fn remove(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Approximate number of stored entries, expired ones included
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entry under `key` only if the stored one is expired at `now`
    async fn remove_if_expired(&self, key: &str, now: Instant) {
        self.entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(current) if current.value().is_expired(now) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CAPACITY)
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key).await?;

        let now = Instant::now();
        if !entry.is_expired(now) {
            return Some(entry.value);
        }

        debug!("Cache entry {} expired", key);
        self.remove_if_expired(key, now).await;
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl))
            .await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = InMemoryCache::default();
        let payload = json!({"results": [{"title": "Rust", "url": "https://www.rust-lang.org"}]});

        cache
            .set("search:rust:all:10:0", payload.clone(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("search:rust:all:10:0").await, Some(payload));
        assert_eq!(cache.get("search:go:all:10:0").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = InMemoryCache::default();
        cache
            .set("k", json!({"n": 1}), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").await, Some(json!({"n": 1})));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let cache = InMemoryCache::default();
        cache.set("k", json!(1), Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        cache.set("k", json!(2), Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k").await, Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_never_expires() {
        let cache = InMemoryCache::default();
        cache.set("k", json!("forever"), Duration::MAX).await.unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.get("k").await, Some(json!("forever")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_keeps_newer_entry() {
        let cache = InMemoryCache::default();
        cache.set("k", json!("old"), Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        // A reader that saw the old entry expire races a fresh write
        cache.set("k", json!("new"), Duration::from_secs(60)).await.unwrap();
        cache.remove_if_expired("k", Instant::now()).await;

        assert_eq!(cache.get("k").await, Some(json!("new")));

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.remove_if_expired("k", Instant::now()).await;
        assert_eq!(cache.entries.get("k").await.map(|e| e.value), None);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::default();
        cache.set("a", json!("a"), Duration::from_secs(60)).await.unwrap();
        cache.set("b", json!("b"), Duration::from_secs(60)).await.unwrap();

        cache.clear().await.unwrap();

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test]
    async fn test_caches_do_not_share_entries() {
        let first = InMemoryCache::default();
        let second = InMemoryCache::default();
        first.set("k", json!(true), Duration::from_secs(60)).await.unwrap();

        second.clear().await.unwrap();

        assert_eq!(first.get("k").await, Some(json!(true)));
        assert_eq!(second.get("k").await, None);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let cache = Arc::new(InMemoryCache::default());

        let writers = (0..16).map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .set("shared", json!(i), Duration::from_secs(60))
                    .await
                    .unwrap();
                cache
                    .set(&format!("own:{}", i), json!(i), Duration::from_secs(60))
                    .await
                    .unwrap();
            })
        });
        for handle in futures::future::join_all(writers).await {
            handle.unwrap();
        }

        // Last writer wins, but the value is always one that was written
        let shared = cache.get("shared").await.unwrap();
        assert!((0..16).any(|i| shared == json!(i)));
        for i in 0..16 {
            assert_eq!(cache.get(&format!("own:{}", i)).await, Some(json!(i)));
        }
    }
}
