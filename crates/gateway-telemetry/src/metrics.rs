//! Prometheus metrics.
//!
//! Metrics live in a private [`Registry`]; nothing is exported over HTTP.
//! Callers that want to expose them can render [`GatewayMetrics::render`].

use crate::events::{DispatchOutcome, GatewayObserver};
use crate::TelemetryError;
use gateway_core::Usage;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Gateway metrics backed by Prometheus
#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    requests: IntCounterVec,
    request_duration: HistogramVec,
    in_flight: IntGaugeVec,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
    rate_limited: IntCounterVec,
    tokens: IntCounterVec,
}

impl GatewayMetrics {
    /// Create and register every metric
    ///
    /// # Errors
    /// Returns error if a metric cannot be created or registered
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new_custom(Some("llm_gateway".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Adapter dispatches by provider and outcome"),
            &["provider", "outcome"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Adapter dispatch latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["provider"],
        )?;
        let in_flight = IntGaugeVec::new(
            Opts::new("requests_in_flight", "Dispatches currently running"),
            &["provider"],
        )?;
        let cache_hits = IntCounterVec::new(
            Opts::new("cache_hits_total", "Responses served from cache"),
            &["provider"],
        )?;
        let cache_misses = IntCounterVec::new(
            Opts::new("cache_misses_total", "Cache lookups that found nothing"),
            &["provider"],
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("rate_limited_total", "Requests rejected by the rate limiter"),
            &["scope"],
        )?;
        let tokens = IntCounterVec::new(
            Opts::new("tokens_total", "Tokens consumed"),
            &["provider", "kind"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(tokens.clone()))?;

        Ok(Self {
            registry,
            requests,
            request_duration,
            in_flight,
            cache_hits,
            cache_misses,
            rate_limited,
            tokens,
        })
    }

    /// The private registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every metric
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn render(&self) -> Result<String, TelemetryError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }

    /// Dispatch count for a provider and outcome label
    #[must_use]
    pub fn requests_total(&self, provider: &str, outcome: &str) -> u64 {
        self.requests.with_label_values(&[provider, outcome]).get()
    }

    /// Cache hit count for a provider
    #[must_use]
    pub fn cache_hits_total(&self, provider: &str) -> u64 {
        self.cache_hits.with_label_values(&[provider]).get()
    }

    /// Rejection count for a limiter scope
    #[must_use]
    pub fn rate_limited_total(&self, scope: &str) -> u64 {
        self.rate_limited.with_label_values(&[scope]).get()
    }

    /// Token count for a provider and kind (`prompt` or `completion`)
    #[must_use]
    pub fn tokens_total(&self, provider: &str, kind: &str) -> u64 {
        self.tokens.with_label_values(&[provider, kind]).get()
    }
}

impl GatewayObserver for GatewayMetrics {
    fn dispatch_started(&self, provider: &str) {
        self.in_flight.with_label_values(&[provider]).inc();
    }

    fn dispatch_finished(&self, provider: &str, outcome: DispatchOutcome, latency: Duration) {
        self.in_flight.with_label_values(&[provider]).dec();
        self.requests
            .with_label_values(&[provider, outcome.label()])
            .inc();
        self.request_duration
            .with_label_values(&[provider])
            .observe(latency.as_secs_f64());
    }

    fn cache_hit(&self, provider: &str) {
        self.cache_hits.with_label_values(&[provider]).inc();
    }

    fn cache_miss(&self, provider: &str) {
        self.cache_misses.with_label_values(&[provider]).inc();
    }

    fn rate_limited(&self, scope: &str, _subject: &str) {
        // Subjects are unbounded; only the scope is a label
        let scope = if scope == "global" { "global" } else { "provider" };
        self.rate_limited.with_label_values(&[scope]).inc();
    }

    fn tokens_used(&self, provider: &str, usage: &Usage) {
        self.tokens
            .with_label_values(&[provider, "prompt"])
            .inc_by(u64::from(usage.prompt_tokens));
        self.tokens
            .with_label_values(&[provider, "completion"])
            .inc_by(u64::from(usage.completion_tokens));
    }
}
