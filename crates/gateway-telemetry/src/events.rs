//! Gateway lifecycle events.
//!
//! The orchestrator reports what it does through [`GatewayObserver`]. Every
//! method has a no-op default so observers implement only what they need.

use gateway_core::{ErrorKind, Usage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The adapter returned a result, or its stream reached the end
    Success,
    /// The adapter failed with the given kind after all retries, or its
    /// stream yielded an error
    Failure(ErrorKind),
    /// The caller dropped a stream before it ended
    Cancelled,
}

impl DispatchOutcome {
    /// Metric label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::Failure(kind) => match kind {
                ErrorKind::ProviderError => "provider_error",
                ErrorKind::RateLimit => "rate_limit",
                ErrorKind::ContextLength => "context_length",
                ErrorKind::InvalidRequest => "invalid_request",
                ErrorKind::Timeout => "timeout",
                ErrorKind::ModelNotFound => "model_not_found",
                ErrorKind::Unknown => "unknown",
            },
        }
    }

    /// Whether the dispatch succeeded
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Receiver of gateway events
pub trait GatewayObserver: Send + Sync {
    /// An adapter call is about to start
    fn dispatch_started(&self, _provider: &str) {}

    /// An adapter call finished, retries included
    fn dispatch_finished(&self, _provider: &str, _outcome: DispatchOutcome, _latency: Duration) {}

    /// A cached response was served
    fn cache_hit(&self, _provider: &str) {}

    /// No cached response was found
    fn cache_miss(&self, _provider: &str) {}

    /// A request was rejected by the rate limiter
    fn rate_limited(&self, _scope: &str, _subject: &str) {}

    /// Tokens consumed by a completed request
    fn tokens_used(&self, _provider: &str, _usage: &Usage) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl GatewayObserver for NoopObserver {}

/// Observer that emits tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl GatewayObserver for LogObserver {
    fn dispatch_started(&self, provider: &str) {
        debug!(provider, "Dispatching request");
    }

    fn dispatch_finished(&self, provider: &str, outcome: DispatchOutcome, latency: Duration) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            DispatchOutcome::Success => info!(provider, latency_ms, "Request completed"),
            DispatchOutcome::Cancelled => debug!(provider, latency_ms, "Request cancelled"),
            DispatchOutcome::Failure(_) => {
                warn!(provider, latency_ms, outcome = outcome.label(), "Request failed");
            }
        }
    }

    fn cache_hit(&self, provider: &str) {
        debug!(provider, "Cache hit");
    }

    fn cache_miss(&self, provider: &str) {
        debug!(provider, "Cache miss");
    }

    fn rate_limited(&self, scope: &str, subject: &str) {
        warn!(scope, subject, "Rate limit exceeded");
    }

    fn tokens_used(&self, provider: &str, usage: &Usage) {
        debug!(
            provider,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Tokens used"
        );
    }
}

/// Fans every event out to a list of observers
#[derive(Default, Clone)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn GatewayObserver>>,
}

impl std::fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl CompositeObserver {
    /// Create an empty fan-out
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn GatewayObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of observers
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether there are no observers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl GatewayObserver for CompositeObserver {
    fn dispatch_started(&self, provider: &str) {
        for o in &self.observers {
            o.dispatch_started(provider);
        }
    }

    fn dispatch_finished(&self, provider: &str, outcome: DispatchOutcome, latency: Duration) {
        for o in &self.observers {
            o.dispatch_finished(provider, outcome, latency);
        }
    }

    fn cache_hit(&self, provider: &str) {
        for o in &self.observers {
            o.cache_hit(provider);
        }
    }

    fn cache_miss(&self, provider: &str) {
        for o in &self.observers {
            o.cache_miss(provider);
        }
    }

    fn rate_limited(&self, scope: &str, subject: &str) {
        for o in &self.observers {
            o.rate_limited(scope, subject);
        }
    }

    fn tokens_used(&self, provider: &str, usage: &Usage) {
        for o in &self.observers {
            o.tokens_used(provider, usage);
        }
    }
}
