//! Response cache keyed by request fingerprint.
//!
//! Entries are JSON-serialised [`CompletionResult`]s stored under
//! `llm:cache:{fingerprint}`. Backend failures never fail a request: reads
//! degrade to a miss and writes are skipped, both with a warning.

use crate::store::KeyValueStore;
use gateway_core::{ChatMessage, CompletionResult, RequestOptions};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "llm:cache:";

/// Default entry lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Serialize)]
struct FingerprintInput<'a> {
    provider: &'a str,
    messages: &'a [ChatMessage],
    options: &'a RequestOptions,
}

/// Deterministic request fingerprint.
///
/// SHA-256 over the canonical JSON of the provider name, the ordered messages
/// and the resolved options, hex-encoded. Map keys are serialised in sorted
/// order so field order never affects the result.
#[must_use]
pub fn fingerprint(provider: &str, messages: &[ChatMessage], options: &RequestOptions) -> String {
    let input = FingerprintInput {
        provider,
        messages,
        options,
    };
    // Value maps are sorted, which makes the encoding canonical.
    let canonical = serde_json::to_value(&input)
        .and_then(|v| serde_json::to_vec(&v))
        .unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// Completed-response cache over a [`KeyValueStore`]
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("store", &self.store.name())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ResponseCache {
    /// Create a cache with the default TTL
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Set the entry lifetime used by callers that do not pass one
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Configured entry lifetime
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store key of a fingerprint
    #[must_use]
    pub fn key(fingerprint: &str) -> String {
        format!("{KEY_PREFIX}{fingerprint}")
    }

    /// Look up a cached result.
    ///
    /// A corrupt entry is deleted and reported as a miss.
    pub async fn get(&self, fingerprint: &str) -> Option<CompletionResult> {
        let key = Self::key(fingerprint);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, backend = self.store.name(), "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, key = %key, "Discarding corrupt cache entry");
                if let Err(e) = self.store.del(&key).await {
                    warn!(error = %e, "Failed to delete corrupt cache entry");
                }
                None
            }
        }
    }

    /// Store a result for `ttl`
    pub async fn put(&self, fingerprint: &str, result: &CompletionResult, ttl: Duration) {
        let key = Self::key(fingerprint);
        let value = match serde_json::to_string(result) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialise result for cache");
                return;
            }
        };

        match self.store.set(&key, &value, ttl).await {
            Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached response"),
            Err(e) => warn!(error = %e, backend = self.store.name(), "Cache write failed"),
        }
    }

    /// Remove an entry
    pub async fn invalidate(&self, fingerprint: &str) {
        if let Err(e) = self.store.del(&Self::key(fingerprint)).await {
            warn!(error = %e, "Cache delete failed");
        }
    }
}
