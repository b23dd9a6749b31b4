//! Provider registry.
//!
//! Adapters are built from a compile-time constructor table, initialised
//! once and then shared as `Arc<dyn LLMProvider>`. Registration order is
//! preserved and drives health-aware fallback.

use crate::anthropic::AnthropicProvider;
use crate::catalog;
use crate::deepseek::DeepSeekProvider;
use crate::openrouter::OpenRouterProvider;
use futures::future::join_all;
use gateway_config::{GatewayConfig, ProviderConfig, ANTHROPIC, DEEPSEEK, OPENROUTER};
use gateway_core::{GatewayError, GatewayResult, LLMProvider, ModelCapabilities};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds an adapter from its configuration
pub type ProviderConstructor = fn(&ProviderConfig) -> GatewayResult<Arc<dyn LLMProvider>>;

/// Adapters that can be created by name
pub static BUILTIN_PROVIDERS: &[(&str, ProviderConstructor)] = &[
    (OPENROUTER, OpenRouterProvider::create),
    (DEEPSEEK, DeepSeekProvider::create),
    (ANTHROPIC, AnthropicProvider::create),
];

/// Constructor registered for `name`
#[must_use]
pub fn builtin_constructor(name: &str) -> Option<ProviderConstructor> {
    BUILTIN_PROVIDERS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, constructor)| *constructor)
}

/// A registered adapter
#[derive(Clone)]
pub struct ProviderEntry {
    /// Provider name
    pub name: String,
    /// The adapter
    pub provider: Arc<dyn LLMProvider>,
    /// Static model list
    pub models: Vec<String>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

/// Registry of initialised adapters
pub struct ProviderRegistry {
    entries: RwLock<Vec<ProviderEntry>>,
    default_provider: String,
    aggregator: String,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .field("default_provider", &self.default_provider)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry with the given default provider.
    ///
    /// The aggregator defaults to OpenRouter.
    #[must_use]
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            default_provider: default_provider.into(),
            aggregator: OPENROUTER.to_string(),
        }
    }

    /// Set the provider that serves vendor-qualified models whose vendor
    /// has no adapter of its own
    #[must_use]
    pub fn with_aggregator(mut self, aggregator: impl Into<String>) -> Self {
        self.aggregator = aggregator.into();
        self
    }

    /// Build and register every enabled provider that has credentials
    ///
    /// # Errors
    /// Returns `ProviderError` if any configured provider fails to build or
    /// initialise
    pub async fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let registry =
            Self::new(&config.default_provider).with_aggregator(&config.aggregator_provider);

        for provider in config.enabled_providers() {
            if provider.resolved_api_key().is_none() {
                debug!(provider = %provider.name, "Skipping provider without API key");
                continue;
            }
            registry.create_and_register(&provider.name, provider).await?;
        }

        if registry.is_empty() {
            warn!("No providers registered");
        }
        Ok(registry)
    }

    /// Name of the default provider
    #[must_use]
    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Name of the aggregator provider
    #[must_use]
    pub fn aggregator(&self) -> &str {
        &self.aggregator
    }

    /// Build a built-in adapter, initialise it and register it
    ///
    /// # Errors
    /// Returns `ProviderError` carrying `name` if the name is unknown, the
    /// adapter cannot be built or initialisation fails. Nothing is
    /// registered on failure.
    pub async fn create_and_register(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> GatewayResult<Arc<dyn LLMProvider>> {
        let constructor = builtin_constructor(name).ok_or_else(|| {
            GatewayError::provider(format!("unknown provider: {name}")).for_provider(name)
        })?;
        let provider = constructor(config).map_err(|e| creation_failed(name, e))?;

        let models = if config.models.is_empty() {
            static_models(name)
        } else {
            config.models.clone()
        };
        self.install(name, provider, models).await
    }

    /// Initialise and register an already-constructed adapter
    ///
    /// # Errors
    /// Returns `ProviderError` if initialisation fails
    pub async fn register(&self, provider: Arc<dyn LLMProvider>) -> GatewayResult<Arc<dyn LLMProvider>> {
        let name = provider.name().to_string();
        let models = static_models(&name);
        self.install(&name, provider, models).await
    }

    async fn install(
        &self,
        name: &str,
        provider: Arc<dyn LLMProvider>,
        models: Vec<String>,
    ) -> GatewayResult<Arc<dyn LLMProvider>> {
        provider
            .initialize()
            .await
            .map_err(|e| creation_failed(name, e))?;

        let entry = ProviderEntry {
            name: name.to_string(),
            provider: Arc::clone(&provider),
            models,
        };

        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.name == name) {
            *existing = entry;
        } else {
            entries.push(entry);
        }
        info!(provider = name, "Provider registered");
        Ok(provider)
    }

    /// Whether no adapter is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn get(&self, name: &str) -> Option<Arc<dyn LLMProvider>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.provider))
    }

    /// The named adapter, or the default one
    ///
    /// # Errors
    /// Returns `ProviderError` if the provider is not registered
    pub fn resolve(&self, name: Option<&str>) -> GatewayResult<Arc<dyn LLMProvider>> {
        let name = name.unwrap_or(&self.default_provider);
        self.get(name).ok_or_else(|| {
            GatewayError::provider(format!("provider {name} not found")).for_provider(name)
        })
    }

    /// The first healthy adapter: the default first, then the others in
    /// registration order
    ///
    /// # Errors
    /// Returns `ProviderError` if no adapter reports healthy
    pub async fn resolve_best_available(&self) -> GatewayResult<Arc<dyn LLMProvider>> {
        let candidates: Vec<ProviderEntry> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|e| e.name == self.default_provider)
                .chain(entries.iter().filter(|e| e.name != self.default_provider))
                .cloned()
                .collect()
        };

        for candidate in candidates {
            if candidate.provider.health_check().await {
                return Ok(candidate.provider);
            }
            warn!(provider = %candidate.name, "Provider unhealthy, trying next");
        }

        Err(GatewayError::provider("no healthy providers available"))
    }

    /// Adapter for a model id, together with the model id to pass on.
    ///
    /// A `vendor/model` id goes to the vendor's own adapter with the prefix
    /// stripped, or to the aggregator with the full id when the vendor has
    /// no adapter. Bare ids and no model go to the default provider.
    ///
    /// # Errors
    /// Returns `ProviderError` if the selected provider is not registered
    pub fn resolve_for_model(
        &self,
        model: Option<&str>,
    ) -> GatewayResult<(Arc<dyn LLMProvider>, Option<String>)> {
        let Some(model) = model else {
            return Ok((self.resolve(None)?, None));
        };

        match model.split_once('/') {
            Some((vendor, bare)) if vendor != self.aggregator => match self.get(vendor) {
                Some(provider) => Ok((provider, Some(bare.to_string()))),
                None => Ok((self.resolve(Some(&self.aggregator))?, Some(model.to_string()))),
            },
            Some(_) => Ok((self.resolve(Some(&self.aggregator))?, Some(model.to_string()))),
            None => Ok((self.resolve(None)?, Some(model.to_string()))),
        }
    }

    /// Static model list of a provider
    ///
    /// # Errors
    /// Returns `ProviderError` if the provider is unknown or has no models
    pub fn list_models(&self, name: &str) -> GatewayResult<Vec<String>> {
        let registered = self
            .entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.models.clone());

        registered
            .or_else(|| catalog::default_models(name).map(to_strings))
            .filter(|models| !models.is_empty())
            .ok_or_else(|| {
                GatewayError::provider(format!(
                    "provider {name} not found or has no models defined"
                ))
                .for_provider(name)
            })
    }

    /// Registered provider names in registration order
    #[must_use]
    pub fn list_providers(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name.clone()).collect()
    }

    /// Health of every registered adapter
    pub async fn health_check(&self) -> BTreeMap<String, bool> {
        let entries: Vec<ProviderEntry> = self.entries.read().clone();
        let results = join_all(entries.iter().map(|e| e.provider.health_check())).await;
        entries
            .into_iter()
            .map(|e| e.name)
            .zip(results)
            .collect()
    }

    /// Catalog capabilities of a model
    #[must_use]
    pub fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        catalog::capabilities(model)
    }
}

fn creation_failed(name: &str, error: GatewayError) -> GatewayError {
    GatewayError::provider(format!("failed to create provider {name}: {}", error.message()))
        .for_provider(name)
        .with_source(error)
}

fn static_models(name: &str) -> Vec<String> {
    catalog::default_models(name).map(to_strings).unwrap_or_default()
}

fn to_strings(models: &[&str]) -> Vec<String> {
    models.iter().map(|m| (*m).to_string()).collect()
}
