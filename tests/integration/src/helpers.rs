//! Test helper utilities for integration tests

use async_trait::async_trait;
use futures::{stream, StreamExt};
use gateway_config::ProviderConfig;
use gateway_core::{
    ChatMessage, CompletionResult, CompletionStream, ErrorKind, GatewayError, GatewayResult,
    LLMProvider, ModelCapabilities, RequestOptions, StreamEvent, Usage,
};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{
    KeyValueStore, ManualClock, MemoryStore, RateLimitConfig, RetryPolicyBuilder, WindowLimit,
};
use gateway_service::{EventStream, Gateway, GatewayBuilder};
use gateway_telemetry::GatewayMetrics;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// In-process adapter whose answers are scripted per call.
///
/// Queued failures are returned first, one per call; once the queue is empty
/// every call succeeds.
pub struct ScriptedProvider {
    name: String,
    healthy: bool,
    failures: Mutex<VecDeque<ErrorKind>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<RequestOptions>>,
}

impl ScriptedProvider {
    /// A healthy adapter that always succeeds
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            healthy: true,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// An adapter whose health probe fails
    pub fn unhealthy(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            healthy: false,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Fail the next `times` calls with `kind`
    pub fn fail_next(&self, kind: ErrorKind, times: usize) {
        self.failures.lock().extend(std::iter::repeat(kind).take(times));
    }

    /// Calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options of every call received, oldest first
    pub fn seen_options(&self) -> Vec<RequestOptions> {
        self.seen.lock().clone()
    }

    fn record(&self, options: &RequestOptions) -> GatewayResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(options.clone());
        if let Some(kind) = self.failures.lock().pop_front() {
            return Err(GatewayError::new(kind, format!("scripted {} failure", kind.code()))
                .for_provider(&self.name));
        }
        Ok(options.model.clone().unwrap_or_default())
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    fn capabilities(&self, _model: &str) -> Option<ModelCapabilities> {
        None
    }

    async fn initialize(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn resolve_options(&self, options: &RequestOptions) -> RequestOptions {
        let mut resolved = options.clone();
        resolved.model.get_or_insert_with(|| self.default_model().to_string());
        resolved.max_tokens.get_or_insert(512);
        resolved
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionResult> {
        let model = self.record(options)?;
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(CompletionResult::new(
            format!("{} echoes: {last}", self.name),
            Usage::new(7, 3),
            model,
            self.name.clone(),
            2,
        ))
    }

    async fn complete_stream(
        &self,
        _messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionStream> {
        let model = self.record(options)?;
        let name = self.name.clone();
        let parts: Vec<GatewayResult<CompletionResult>> = ["one ", "two ", "three"]
            .iter()
            .map(|t| Ok(CompletionResult::new(*t, Usage::zero(), model.clone(), name.clone(), 1)))
            .collect();
        Ok(Box::pin(stream::iter(parts)))
    }

    async fn list_models(&self) -> GatewayResult<Vec<String>> {
        Ok(vec![self.default_model().to_string()])
    }
}

/// A gateway over a fresh in-memory store, with a manual clock for the
/// rate limiter and millisecond retry delays
pub struct TestGateway {
    pub gateway: Gateway,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub metrics: GatewayMetrics,
}

/// Builder for [`TestGateway`]
pub struct TestGatewayBuilder {
    registry: ProviderRegistry,
    rate_limits: RateLimitConfig,
    max_retries: u32,
    cache_enabled: bool,
    cache_ttl: Duration,
    health_aware_default: bool,
}

impl TestGatewayBuilder {
    /// Start from a registry whose default provider is `default_provider`
    pub fn new(default_provider: &str) -> Self {
        init_tracing();
        Self {
            registry: ProviderRegistry::new(default_provider),
            rate_limits: RateLimitConfig::default(),
            max_retries: 3,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            health_aware_default: false,
        }
    }

    /// Register an in-process adapter
    pub async fn provider(self, provider: Arc<dyn LLMProvider>) -> Self {
        self.registry.register(provider).await.unwrap();
        self
    }

    /// Build and register a built-in adapter
    pub async fn builtin(self, config: &ProviderConfig) -> Self {
        self.registry
            .create_and_register(&config.name, config)
            .await
            .unwrap();
        self
    }

    /// Set both windows to one minute with the given limits
    pub fn rate_limits(mut self, global: u32, provider: u32) -> Self {
        self.rate_limits = RateLimitConfig {
            global: WindowLimit::new(Duration::from_secs(60), global),
            provider: WindowLimit::new(Duration::from_secs(60), provider),
        };
        self
    }

    /// Set the retry budget
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Disable the response cache
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Set the cache entry lifetime
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Select the first healthy provider for requests without a model
    pub fn health_aware_default(mut self) -> Self {
        self.health_aware_default = true;
        self
    }

    /// Build the gateway
    pub fn build(self) -> TestGateway {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let metrics = GatewayMetrics::new().unwrap();
        let retry = RetryPolicyBuilder::new()
            .max_retries(self.max_retries)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(10))
            .build();

        let kv: Arc<dyn KeyValueStore> = store.clone();
        let gateway = GatewayBuilder::new(Arc::new(self.registry), kv)
            .rate_limits(self.rate_limits)
            .retry_policy(retry)
            .cache_enabled(self.cache_enabled)
            .cache_ttl(self.cache_ttl)
            .health_aware_default(self.health_aware_default)
            .clock(clock.clone())
            .observer(Arc::new(metrics.clone()))
            .build();

        TestGateway {
            gateway,
            store,
            clock,
            metrics,
        }
    }
}

/// Drain a decorated stream into its events, failing on any error item
pub async fn collect_events(stream: EventStream) -> Vec<StreamEvent> {
    stream.map(|event| event.unwrap()).collect().await
}

/// Concatenated chunk text of a list of events
pub fn joined_text(events: &[StreamEvent]) -> String {
    events.iter().filter_map(StreamEvent::text).collect()
}

/// Assert that a result failed with `kind`
pub fn assert_kind<T: std::fmt::Debug>(result: &GatewayResult<T>, kind: ErrorKind) {
    match result {
        Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {e}"),
        Ok(value) => panic!("expected {kind:?}, got {value:?}"),
    }
}
