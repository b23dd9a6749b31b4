//! The gateway orchestrator.
//!
//! A non-streaming request goes through:
//!
//! 1. validation
//! 2. global admission
//! 3. adapter selection
//! 4. provider admission
//! 5. option resolution and cache lookup
//! 6. dispatch under the retry policy
//! 7. write-through to the cache
//!
//! Streaming requests share steps 1 to 4, then open the stream under the
//! retry policy and skip the cache entirely.

use crate::stream::{decorate, EventStream};
use gateway_config::GatewayConfig;
use gateway_core::{
    validate_messages, ChatMessage, CompletionResult, GatewayError, GatewayResult, LLMProvider,
    ModelCapabilities, RequestOptions,
};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{
    fingerprint, Clock, KeyValueStore, RateLimitConfig, RateLimiter, RateScope, ResponseCache,
    RetryConfig, RetryPolicy, WindowLimit,
};
use gateway_telemetry::{DispatchOutcome, GatewayObserver, LogObserver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Request orchestrator
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    limiter: RateLimiter,
    cache: Option<ResponseCache>,
    retry: RetryPolicy,
    observer: Arc<dyn GatewayObserver>,
    health_aware_default: bool,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("limiter", &self.limiter)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("health_aware_default", &self.health_aware_default)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Start building a gateway over a registry and a key-value store
    #[must_use]
    pub fn builder(registry: Arc<ProviderRegistry>, store: Arc<dyn KeyValueStore>) -> GatewayBuilder {
        GatewayBuilder::new(registry, store)
    }

    /// Build a gateway from configuration
    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        GatewayBuilder::from_config(config, registry, store).build()
    }

    /// The provider registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Complete a conversation for `subject`
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty conversation or out-of-range options
    /// - `RateLimit` when either window is exhausted
    /// - `ProviderError` when no adapter can serve the request
    /// - the adapter's classified error once retries are exhausted
    #[instrument(skip(self, messages, options), fields(model = options.model.as_deref().unwrap_or("default")))]
    pub async fn complete(
        &self,
        subject: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionResult> {
        let (provider, resolved) = self.admit(subject, messages, options).await?;
        let name = provider.name().to_string();

        let key = fingerprint(&name, messages, &resolved);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&key).await {
                self.observer.cache_hit(&name);
                debug!(provider = %name, "Serving cached response");
                return Ok(cached);
            }
            self.observer.cache_miss(&name);
        }

        self.observer.dispatch_started(&name);
        let started = Instant::now();
        let result = self
            .retry
            .execute(|| provider.complete(messages, &resolved))
            .await;
        self.finish_dispatch(&name, &result, started.elapsed());

        let result = result?;
        self.observer.tokens_used(&name, &result.usage);
        if let Some(cache) = &self.cache {
            cache.put(&key, &result, cache.ttl()).await;
        }

        info!(
            provider = %name,
            model = %result.metadata.model,
            latency_ms = result.metadata.latency_ms,
            total_tokens = result.usage.total_tokens,
            "Completion successful"
        );
        Ok(result)
    }

    /// Stream a completion for `subject`.
    ///
    /// Opening the stream is retried like a blocking call; failures after
    /// the first element are delivered in the stream and never retried.
    /// The dispatch outcome is reported when the stream ends, fails or is
    /// dropped, not when it opens.
    ///
    /// # Errors
    /// Same as [`Gateway::complete`], for failures before the stream opens
    #[instrument(skip(self, messages, options), fields(model = options.model.as_deref().unwrap_or("default")))]
    pub async fn complete_stream(
        &self,
        subject: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<EventStream> {
        let started = Instant::now();
        let (provider, resolved) = self.admit(subject, messages, options).await?;
        let name = provider.name().to_string();

        self.observer.dispatch_started(&name);
        let opened = self
            .retry
            .execute(|| provider.complete_stream(messages, &resolved))
            .await;
        let inner = match opened {
            Ok(inner) => inner,
            Err(e) => {
                self.observer.dispatch_finished(
                    &name,
                    DispatchOutcome::Failure(e.kind()),
                    started.elapsed(),
                );
                return Err(e);
            }
        };

        // The decorated stream reports the end of this dispatch
        debug!(provider = %name, "Stream opened");
        Ok(decorate(inner, name, started, self.observer.clone()))
    }

    /// Registered provider names
    #[must_use]
    pub fn list_providers(&self) -> Vec<String> {
        self.registry.list_providers()
    }

    /// Static model list of a provider
    ///
    /// # Errors
    /// Returns `ProviderError` for an unknown provider
    pub fn list_models(&self, provider: &str) -> GatewayResult<Vec<String>> {
        self.registry.list_models(provider)
    }

    /// Health of every registered provider
    pub async fn health_check(&self) -> BTreeMap<String, bool> {
        self.registry.health_check().await
    }

    /// Catalog capabilities of a model
    #[must_use]
    pub fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        self.registry.capabilities(model)
    }

    /// Steps shared by both request kinds: validation, both admission
    /// checks, adapter selection and option resolution
    async fn admit(
        &self,
        subject: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<(Arc<dyn LLMProvider>, RequestOptions)> {
        validate_messages(messages)?;
        options.validate()?;

        self.check_rate(subject, RateScope::Global).await?;

        let (provider, model) = self.select(options).await?;
        self.check_rate(subject, RateScope::Provider(provider.name()))
            .await?;

        let mut routed = options.clone();
        if model.is_some() {
            routed.model = model;
        }
        let resolved = provider.resolve_options(&routed).await;
        debug!(
            provider = provider.name(),
            model = resolved.model.as_deref().unwrap_or_default(),
            "Request admitted"
        );
        Ok((provider, resolved))
    }

    async fn select(
        &self,
        options: &RequestOptions,
    ) -> GatewayResult<(Arc<dyn LLMProvider>, Option<String>)> {
        if options.model.is_none() && self.health_aware_default {
            return Ok((self.registry.resolve_best_available().await?, None));
        }
        self.registry.resolve_for_model(options.model.as_deref())
    }

    async fn check_rate(&self, subject: &str, scope: RateScope<'_>) -> GatewayResult<()> {
        let decision = self.limiter.check(subject, scope).await?;
        if decision.allowed {
            return Ok(());
        }

        self.observer.rate_limited(scope.as_str(), subject);
        let remaining = self.limiter.remaining_requests(subject, scope).await?;
        let err = GatewayError::rate_limit(format!(
            "rate limit of {} requests exceeded for scope {scope}",
            decision.limit
        ))
        .with_remaining(remaining);
        Err(match scope {
            RateScope::Global => err,
            RateScope::Provider(name) => err.for_provider(name),
        })
    }

    fn finish_dispatch<T>(&self, provider: &str, result: &GatewayResult<T>, latency: Duration) {
        let outcome = match result {
            Ok(_) => DispatchOutcome::Success,
            Err(e) => DispatchOutcome::Failure(e.kind()),
        };
        self.observer.dispatch_finished(provider, outcome, latency);
    }
}

/// Builder for [`Gateway`]
pub struct GatewayBuilder {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn KeyValueStore>,
    rate_limits: RateLimitConfig,
    retry: RetryPolicy,
    cache_enabled: bool,
    cache_ttl: Duration,
    clock: Option<Arc<dyn Clock>>,
    observer: Arc<dyn GatewayObserver>,
    health_aware_default: bool,
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("rate_limits", &self.rate_limits)
            .field("retry", &self.retry)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Defaults: standard windows, three retries, caching on for one hour,
    /// system clock, log observer
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            registry,
            store,
            rate_limits: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            cache_enabled: true,
            cache_ttl: gateway_resilience::DEFAULT_CACHE_TTL,
            clock: None,
            observer: Arc::new(LogObserver),
            health_aware_default: false,
        }
    }

    /// Builder with windows, retries, caching and default selection taken
    /// from configuration
    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let rate_limits = RateLimitConfig {
            global: WindowLimit::new(
                config.rate_limit.global.window,
                config.rate_limit.global.max_requests,
            ),
            provider: WindowLimit::new(
                config.rate_limit.provider.window,
                config.rate_limit.provider.max_requests,
            ),
        };
        let retry = RetryPolicy::new(RetryConfig {
            max_retries: config.retry.max_retries,
            base_delay: config.retry.base_delay,
            max_delay: config.retry.max_delay,
            ..RetryConfig::default()
        });

        Self::new(registry, store)
            .rate_limits(rate_limits)
            .retry_policy(retry)
            .cache_enabled(config.cache.enabled)
            .cache_ttl(config.cache.ttl)
            .health_aware_default(config.health_aware_default)
    }

    /// Set both rate-limit windows
    #[must_use]
    pub fn rate_limits(mut self, limits: RateLimitConfig) -> Self {
        self.rate_limits = limits;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable the response cache
    #[must_use]
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the cache entry lifetime
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Read rate-limit time from `clock`
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Report events to `observer`
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn GatewayObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Pick the first healthy provider when a request names no model
    #[must_use]
    pub fn health_aware_default(mut self, enabled: bool) -> Self {
        self.health_aware_default = enabled;
        self
    }

    /// Build the gateway
    #[must_use]
    pub fn build(self) -> Gateway {
        let mut limiter = RateLimiter::new(Arc::clone(&self.store), self.rate_limits);
        if let Some(clock) = self.clock {
            limiter = limiter.with_clock(clock);
        }
        let cache = self
            .cache_enabled
            .then(|| ResponseCache::new(Arc::clone(&self.store)).with_ttl(self.cache_ttl));

        Gateway {
            registry: self.registry,
            limiter,
            cache,
            retry: self.retry,
            observer: self.observer,
            health_aware_default: self.health_aware_default,
        }
    }
}
