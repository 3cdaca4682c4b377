//! Synchronous client
//!
//! Wraps the async [`Client`](crate::Client) with a private single-threaded
//! runtime. Every call blocks the current thread for the whole pipeline,
//! rate-limit waits and retry backoff included.
//!
//! Do not create or use this client from inside an async runtime; use the
//! async client there instead.

use crate::cache::Cache;
use crate::config::Settings;
use crate::error::{OpenSerpError, Result};
use crate::metrics::MetricsSnapshot;
use crate::search::{self, SearchRequest};
use serde_json::Value;
use tokio::runtime::Runtime;

/// Blocking OpenSerp client
pub struct Client {
    inner: search::Client,
    runtime: Runtime,
}

impl Client {
    /// Client for `http://localhost:7000` with default settings
    pub fn new() -> Result<Self> {
        Self::from_async(search::Client::new()?)
    }

    pub fn builder() -> search::ClientBuilder {
        search::ClientBuilder::new()
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::from_async(search::Client::from_settings(settings)?)
    }

    /// Drive an existing async client from blocking code
    pub fn from_async(inner: search::Client) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                OpenSerpError::connection_caused_by(format!("Failed to start runtime: {}", e), e)
            })?;

        Ok(Self { inner, runtime })
    }

    /// See [`Client::search`](crate::Client::search)
    pub fn search(&self, request: &SearchRequest) -> Result<Value> {
        self.runtime.block_on(self.inner.search(request))
    }

    /// See [`Client::list_engines`](crate::Client::list_engines)
    pub fn list_engines(&self) -> Result<Vec<String>> {
        self.runtime.block_on(self.inner.list_engines())
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.runtime.block_on(self.inner.clear_cache())
    }

    /// Look up a cached payload directly
    pub fn cached(&self, key: &str) -> Option<Value> {
        self.runtime.block_on(self.inner.cache().get(key))
    }

    pub fn cache(&self) -> &dyn Cache {
        self.inner.cache()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics()
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    /// Release the connection pool and the runtime
    pub fn close(self) {
        let Self { inner, runtime } = self;
        inner.close();
        drop(runtime);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::Client")
            .field("inner", &self.inner)
            .finish()
    }
}
