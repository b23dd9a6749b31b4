//! Sliding-window rate limiting over a [`KeyValueStore`].
//!
//! Each admitted request writes one key,
//! `rate-limit:{scope}:{hex(subject)}:{timestamp_ms}:{nonce}`, that expires
//! with the window. The subject is hex-encoded so that `:` or glob
//! characters in it (IPv6 addresses, for one) cannot reach another
//! subject's entries. A check prunes entries that have left the window, counts the
//! rest and records a new entry only when the count is below the limit.
//!
//! Check-then-record is not atomic across instances; concurrent checks can
//! over-admit by at most the number of racing requests.

use crate::clock::{Clock, SystemClock};
use crate::store::{KeyValueStore, StoreError};
use gateway_core::{GatewayError, GatewayResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const KEY_PREFIX: &str = "rate-limit";

/// Which quota a check applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope<'a> {
    /// Every request of a subject
    Global,
    /// Requests of a subject to one provider
    Provider(&'a str),
}

impl RateScope<'_> {
    /// Segment used in store keys
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Provider(name) => name,
        }
    }
}

impl fmt::Display for RateScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    /// Window length
    pub window: Duration,
    /// Requests admitted per window
    pub max_requests: u32,
}

impl WindowLimit {
    /// Create a window
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Limits for both scopes
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Global window (default 100 requests per minute)
    pub global: WindowLimit,
    /// Per-provider window (default 1000 requests per hour)
    pub provider: WindowLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: WindowLimit::new(Duration::from_secs(60), 100),
            provider: WindowLimit::new(Duration::from_secs(3600), 1000),
        }
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request was admitted (and recorded)
    pub allowed: bool,
    /// Window limit
    pub limit: u32,
    /// Requests still admissible in the window after this one
    pub remaining: u32,
}

/// Sliding-window limiter
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter on the system clock
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Read time from `clock`
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured limits
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn limit_for(&self, scope: RateScope<'_>) -> WindowLimit {
        match scope {
            RateScope::Global => self.config.global,
            RateScope::Provider(_) => self.config.provider,
        }
    }

    /// Check and, when admitted, record a request.
    ///
    /// # Errors
    /// Returns `Unknown` if the store fails; the request is not admitted
    pub async fn check(&self, subject: &str, scope: RateScope<'_>) -> GatewayResult<RateDecision> {
        let limit = self.limit_for(scope);
        let now = self.clock.now_millis();
        let count = self.count_in_window(subject, scope, limit, now, true).await?;

        if count >= limit.max_requests {
            debug!(subject, scope = %scope, count, limit = limit.max_requests, "Rate limit reached");
            return Ok(RateDecision {
                allowed: false,
                limit: limit.max_requests,
                remaining: 0,
            });
        }

        let key = format!(
            "{}:{now}:{}",
            entry_prefix(subject, scope),
            Uuid::new_v4().simple()
        );
        self.store
            .set(&key, "1", limit.window)
            .await
            .map_err(store_failure)?;

        Ok(RateDecision {
            allowed: true,
            limit: limit.max_requests,
            remaining: limit.max_requests - count - 1,
        })
    }

    /// Requests still admissible in the current window. Never records.
    ///
    /// # Errors
    /// Returns `Unknown` if the store fails
    pub async fn remaining_requests(&self, subject: &str, scope: RateScope<'_>) -> GatewayResult<u32> {
        let limit = self.limit_for(scope);
        let now = self.clock.now_millis();
        let count = self.count_in_window(subject, scope, limit, now, false).await?;
        Ok(limit.max_requests.saturating_sub(count))
    }

    async fn count_in_window(
        &self,
        subject: &str,
        scope: RateScope<'_>,
        limit: WindowLimit,
        now: i64,
        prune: bool,
    ) -> GatewayResult<u32> {
        let window_start = now.saturating_sub(limit.window_millis());
        let pattern = format!("{}:*", entry_prefix(subject, scope));
        let keys = self.store.keys(&pattern).await.map_err(store_failure)?;

        let mut count = 0u32;
        for key in keys {
            let Some(ts) = entry_timestamp(&key) else {
                continue;
            };
            if ts <= window_start {
                if prune {
                    if let Err(e) = self.store.del(&key).await {
                        warn!(error = %e, key = %key, "Failed to prune rate-limit entry");
                    }
                }
            } else if ts <= now {
                count = count.saturating_add(1);
            }
        }
        Ok(count)
    }
}

/// Key segments shared by every entry of one subject in one scope
fn entry_prefix(subject: &str, scope: RateScope<'_>) -> String {
    format!("{KEY_PREFIX}:{scope}:{}", hex::encode(subject))
}

/// Timestamp segment of an entry key (second from the end)
fn entry_timestamp(key: &str) -> Option<i64> {
    let mut parts = key.rsplitn(3, ':');
    parts.next()?;
    parts.next()?.parse().ok()
}

fn store_failure(error: StoreError) -> GatewayError {
    warn!(error = %error, "Rate limiter store unavailable");
    GatewayError::unknown("rate limiter store unavailable").with_source(error)
}
