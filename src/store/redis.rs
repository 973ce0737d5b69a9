use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Script;
use std::time::Duration;
use tracing::{debug, error};

use super::{SharedStore, WindowHit};
use crate::config::RedisConfig;
use crate::error::StoreError;

/// KEYS[1] counter, ARGV: points, window ms, limit, block ms.
const INCREMENT_WINDOW: &str = r#"
local consumed = redis.call('INCRBY', KEYS[1], ARGV[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
  ttl = tonumber(ARGV[2])
end
local limit = tonumber(ARGV[3])
local block = tonumber(ARGV[4])
if block > 0 and consumed > limit and consumed - tonumber(ARGV[1]) <= limit then
  redis.call('PEXPIRE', KEYS[1], block)
  ttl = block
end
return {consumed, ttl}
"#;

/// Redis (or any RESP-compatible server) backend.
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
    increment_window: Script,
}

impl RedisStore {
    /// Every command is bounded by `response_timeout`; a hung server surfaces
    /// as a [`StoreError`] instead of stalling the caller.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            StoreError::Connection(e.to_string())
        })?;

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connection_timeout())
            .set_response_timeout(config.response_timeout());
        let connection_manager = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| {
                error!("Failed to create Redis connection manager: {}", e);
                StoreError::Connection(e.to_string())
            })?;

        let mut conn = connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Connected to shared store at {}", config.url);

        Ok(Self {
            connection_manager,
            increment_window: Script::new(INCREMENT_WINDOW),
        })
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl).max(1))
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn increment_window(
        &self,
        key: &str,
        points: u64,
        limit: u64,
        window: Duration,
        block: Duration,
    ) -> Result<WindowHit, StoreError> {
        let mut conn = self.connection_manager.clone();
        let (consumed, ttl_ms): (i64, i64) = self
            .increment_window
            .key(key)
            .arg(points)
            .arg(millis(window).max(1))
            .arg(limit)
            .arg(millis(block))
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowHit {
            consumed: consumed.max(0) as u64,
            ttl: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}
