//! HTTP networking module
//!
//! Owns the connection pool, the request/response values and the retry
//! policy used for every call to the OpenSerp server.

mod client;
mod request;
mod retry;

pub use client::{is_connection_failure, HttpClient};
pub use request::{ApiRequest, ApiResponse};
pub use retry::{RetryPolicy, RetryStats, DEFAULT_RETRY_STATUSES};
