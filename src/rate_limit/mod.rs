//! Client-side admission control
//!
//! The client calls [`RateLimiter::wait`] before every search. A limiter
//! either grants admission (possibly after suspending the caller) or refuses
//! with a [`RateLimit`](crate::OpenSerpError::RateLimit) error. It never
//! drops a request silently.

mod token_bucket;

pub use token_bucket::{LimitMode, LimiterStats, TokenBucketLimiter};

use crate::error::Result;
use async_trait::async_trait;

/// Admission-control gate shared by all searches of one client
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Return once the request may proceed, or fail with a rate-limit error
    async fn wait(&self) -> Result<()>;
}
