//! Cache-aside memoization over the shared store.
//!
//! Values are stored as JSON. The cache is an optimization only: when the
//! store misbehaves the producer runs and its result is returned uncached.

pub mod search;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::SharedStore;

pub use search::{CachedSearch, Content, ContentKind, SearchProvider, SearchRequest, SearchResults};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoizeError<E> {
    #[error("{0}")]
    Producer(E),

    #[error("producer timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn SharedStore>,
    producer_timeout: Option<Duration>,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            store,
            producer_timeout: None,
        }
    }

    /// Bound every producer call. A producer that overruns counts as failed.
    pub fn with_producer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.producer_timeout = timeout;
        self
    }

    /// Return the value stored at `key`, or run `producer`, store its result
    /// for `ttl` and return it.
    ///
    /// Concurrent misses on one key each run the producer and each caller gets
    /// its own result; only the first write is kept. Producer errors are
    /// returned and never stored.
    pub async fn memoize<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<T, MemoizeError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(key).await {
            debug!("Cache hit for {}", key);
            return Ok(hit);
        }
        debug!("Cache miss for {}", key);

        let value = match self.producer_timeout {
            Some(limit) => tokio::time::timeout(limit, producer())
                .await
                .map_err(|_| MemoizeError::Timeout(limit))?,
            None => producer().await,
        }
        .map_err(MemoizeError::Producer)?;

        self.store_value(key, &value, ttl).await;
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Cache read for {} failed: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn store_value<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize value for {}: {}", key, e);
                return;
            }
        };

        match self.store.set_if_absent(key, &raw, ttl).await {
            Ok(true) => {}
            Ok(false) => debug!("Cache entry {} was written concurrently, keeping it", key),
            Err(e) => warn!("Cache write for {} failed: {}", key, e),
        }
    }
}
