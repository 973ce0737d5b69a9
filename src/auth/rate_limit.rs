use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::config::PolicyConfig;
use crate::error::StoreError;
use crate::store::SharedStore;

/// A named limiting policy: `points` per `window`, then a `block` cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Key prefix in the shared store, keeps policies independent.
    pub name: String,
    pub points: u64,
    pub window: Duration,
    pub block: Duration,
}

impl RateLimitPolicy {
    pub fn new(name: impl Into<String>, points: u64, window: Duration, block: Duration) -> Self {
        Self {
            name: name.into(),
            points,
            window,
            block,
        }
    }

    /// General request volume, per client IP.
    pub fn ddos() -> Self {
        Self::new("ddos", 5, Duration::from_secs(1), Duration::from_secs(10))
    }

    /// Authentication attempts, per client IP.
    pub fn brute_force() -> Self {
        Self::new("brute_force", 5, Duration::from_secs(5 * 60), Duration::from_secs(15 * 60))
    }

    pub fn from_config(name: impl Into<String>, config: &PolicyConfig) -> Self {
        Self::new(
            name,
            config.points,
            Duration::from_secs(config.duration_secs),
            Duration::from_secs(config.block_duration_secs),
        )
    }

    fn key(&self, client: &str) -> String {
        format!("rate_limit:{}:{}", self.name, client)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u64 },
    Blocked { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Distributed limiter for one policy.
///
/// Consumption is one atomic store call, so concurrent requests from the same
/// client and several server instances all see the same counter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn SharedStore>,
    policy: RateLimitPolicy,
    enabled: bool,
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn SharedStore>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            policy,
            enabled: true,
            fail_open: false,
        }
    }

    /// A limiter that allows everything without touching the store.
    pub fn disabled(store: Arc<dyn SharedStore>, policy: RateLimitPolicy) -> Self {
        Self {
            enabled: false,
            ..Self::new(store, policy)
        }
    }

    /// Let requests through instead of rejecting them when the store fails.
    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn consume(&self, client: &str) -> Result<RateLimitDecision, StoreError> {
        if !self.enabled {
            return Ok(RateLimitDecision::Allowed { remaining: self.policy.points });
        }

        let hit = self
            .store
            .increment_window(
                &self.policy.key(client),
                1,
                self.policy.points,
                self.policy.window,
                self.policy.block,
            )
            .await?;

        if hit.consumed > self.policy.points {
            Ok(RateLimitDecision::Blocked { retry_after: hit.ttl })
        } else {
            Ok(RateLimitDecision::Allowed {
                remaining: self.policy.points - hit.consumed,
            })
        }
    }

    /// [`RateLimiter::consume`] with store failures resolved by the
    /// fail-open setting. Store outages are logged, not hidden.
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        match self.consume(client).await {
            Ok(decision) => {
                if let RateLimitDecision::Blocked { retry_after } = decision {
                    warn!(
                        "Rate limit '{}' exceeded by {}, retry after {}s",
                        self.policy.name,
                        client,
                        retry_after.as_secs()
                    );
                }
                decision
            }
            Err(e) => {
                error!("Rate limit store unavailable for '{}': {}", self.policy.name, e);
                if self.fail_open {
                    RateLimitDecision::Allowed { remaining: 0 }
                } else {
                    RateLimitDecision::Blocked { retry_after: self.policy.block.max(self.policy.window) }
                }
            }
        }
    }

    /// Forget everything recorded for `client` under this policy.
    pub async fn reset(&self, client: &str) -> Result<(), StoreError> {
        self.store.delete(&self.policy.key(client)).await
    }
}
