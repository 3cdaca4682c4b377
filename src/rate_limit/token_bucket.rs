//! Token bucket limiter built on governor

use super::RateLimiter;
use crate::error::{OpenSerpError, Result};
use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// What to do when the bucket is empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitMode {
    /// Suspend the caller until a token becomes available
    #[default]
    Block,
    /// Refuse immediately with the time until the next token
    FailFast,
}

/// Snapshot of a limiter's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    pub admitted: u64,
    pub rejected: u64,
}

/// Token bucket rate limiter
///
/// The bucket refills at the configured rate and holds up to `burst`
/// tokens. All state is updated atomically, so one limiter can gate any
/// number of concurrent callers. Admission order is not FIFO.
pub struct TokenBucketLimiter {
    limiter: governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    quota: Quota,
    clock: DefaultClock,
    mode: LimitMode,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

impl TokenBucketLimiter {
    /// Create a limiter from a governor quota
    pub fn new(quota: Quota, mode: LimitMode) -> Self {
        Self {
            limiter: governor::RateLimiter::direct(quota),
            quota,
            clock: DefaultClock::default(),
            mode,
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Allow `requests` per second. Zero is treated as one.
    pub fn per_second(requests: u32) -> Self {
        Self::new(Quota::per_second(non_zero(requests)), LimitMode::Block)
    }

    /// Allow `requests` per minute. Zero is treated as one.
    pub fn per_minute(requests: u32) -> Self {
        Self::new(Quota::per_minute(non_zero(requests)), LimitMode::Block)
    }

    /// Set the bucket size (defaults to the per-period rate)
    pub fn with_burst(self, burst: u32) -> Self {
        Self::new(self.quota.allow_burst(non_zero(burst)), self.mode)
    }

    /// Set the behavior on an empty bucket
    pub fn with_mode(mut self, mode: LimitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> LimitMode {
        self.mode
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn wait(&self) -> Result<()> {
        match self.mode {
            LimitMode::Block => {
                self.limiter.until_ready().await;
            }
            LimitMode::FailFast => {
                if let Err(not_until) = self.limiter.check() {
                    let retry_after = not_until.wait_time_from(self.clock.now());
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!("Rate limit exceeded, next slot in {:?}", retry_after);
                    return Err(OpenSerpError::rate_limit(
                        format!("Rate limit exceeded, retry after {:?}", retry_after),
                        Some(retry_after),
                    ));
                }
            }
        }

        self.admitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
