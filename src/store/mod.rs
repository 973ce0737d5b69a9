//! Shared key-value store
//!
//! Counters for the rate limiter and entries for the cache layer live here.
//! Every mutating operation is a single atomic store call, so several server
//! instances can point at the same backend.

mod memory;
mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Result of an atomic counter increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Points consumed in the current window, including this hit.
    pub consumed: u64,
    /// Time until the counter key expires (window end or block end).
    pub ttl: Duration,
}

#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key` with a TTL unless a live entry already exists.
    /// Returns `true` when the write happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Atomically add `points` to the counter at `key`.
    ///
    /// A fresh counter expires after `window`. When this hit is the one that
    /// pushes the counter past `limit` and `block` is non-zero, the counter's
    /// expiry is moved to `block` from now, so later window boundaries do not
    /// lift the block.
    async fn increment_window(
        &self,
        key: &str,
        points: u64,
        limit: u64,
        window: Duration,
        block: Duration,
    ) -> Result<WindowHit, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
