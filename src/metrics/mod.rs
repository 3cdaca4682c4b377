//! Metrics collection module
//!
//! Per-client counters for searches, cache efficiency and network traffic.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by one client
#[derive(Debug, Default)]
pub struct Metrics {
    searches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_attempts: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a search call, valid or not
    pub fn inc_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one retried exchange that took `attempts` requests
    pub fn record_exchange(&self, attempts: u32) {
        let attempts = u64::from(attempts);
        self.network_attempts.fetch_add(attempts, Ordering::Relaxed);
        self.retries
            .fetch_add(attempts.saturating_sub(1), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_attempts: self.network_attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub searches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// HTTP requests sent, retries included
    pub network_attempts: u64,
    pub retries: u64,
    /// Calls that returned an error
    pub failures: u64,
}

impl MetricsSnapshot {
    /// Share of cache lookups that hit, in percent
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / lookups as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_search();
        metrics.inc_search();
        metrics.record_cache_miss();
        metrics.record_exchange(3);
        metrics.record_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.searches, 2);
        assert_eq!(snapshot.network_attempts, 3);
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.cache_hit_rate(), 50.0);
    }

    #[test]
    fn test_empty_hit_rate() {
        assert_eq!(MetricsSnapshot::default().cache_hit_rate(), 0.0);
    }
}
