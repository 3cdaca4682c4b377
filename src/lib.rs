//! OpenSerp-RS: a client for the OpenSerp multi-engine search API
//!
//! Every search runs through the same pipeline: input validation, optional
//! client-side rate limiting, a cache lookup, the HTTP call with retries,
//! and translation of the outcome into a payload or a typed
//! [`OpenSerpError`]. Successful payloads are cached for the configured TTL.
//!
//! ```no_run
//! use openserp_rs::{Client, SearchRequest};
//!
//! # async fn run() -> openserp_rs::Result<()> {
//! let client = Client::new()?;
//! let request = SearchRequest::new("rust programming")
//!     .with_engines(["google", "bing"])
//!     .with_limit(5);
//! let results = client.search(&request).await?;
//! println!("{}", results);
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod rate_limit;
pub mod search;

pub use cache::{Cache, InMemoryCache};
pub use config::Settings;
pub use error::{ErrorCode, ErrorKind, OpenSerpError, Result};
pub use network::RetryPolicy;
pub use rate_limit::{LimitMode, RateLimiter, TokenBucketLimiter};
pub use search::{Client, ClientBuilder, SearchRequest, SortOrder};

#[cfg(feature = "redis")]
pub use cache::RedisCache;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
