//! # Gateway Resilience
//!
//! Resilience patterns for the LLM Request Gateway:
//! - Retry policy with exponential backoff
//! - Sliding-window rate limiting
//! - Response caching
//! - The key-value store both of them share

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod clock;
pub mod rate_limit;
pub mod retry;
pub mod store;

// Re-export main types
pub use cache::{fingerprint, ResponseCache, DEFAULT_CACHE_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::{RateDecision, RateLimitConfig, RateLimiter, RateScope, WindowLimit};
pub use retry::{RetryConfig, RetryPolicy, RetryPolicyBuilder};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{KeyValueStore, MemoryStore, StoreError, StoreResult};
