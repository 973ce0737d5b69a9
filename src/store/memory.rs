use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{SharedStore, WindowHit};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process store for tests and single-instance deployments.
///
/// A single mutex guards the map, which gives every operation the same
/// per-key atomicity the Redis backend gets from the server.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries. Reads already ignore them, this only reclaims memory.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} expired store entries", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().await.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn increment_window(
        &self,
        key: &str,
        points: u64,
        limit: u64,
        window: Duration,
        block: Duration,
    ) -> Result<WindowHit, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let (previous, mut expires_at) = match entries.get(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let count = entry.value.parse::<u64>().map_err(|e| {
                    StoreError::Serialization(format!("counter at {} is not a number: {}", key, e))
                })?;
                (count, entry.expires_at)
            }
            None => (0, now + window),
        };

        let consumed = previous.saturating_add(points);
        if !block.is_zero() && consumed > limit && previous <= limit {
            expires_at = now + block;
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: consumed.to_string(),
                expires_at,
            },
        );

        Ok(WindowHit {
            consumed,
            ttl: expires_at.saturating_duration_since(now),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
