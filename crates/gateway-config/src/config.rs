//! Configuration types.

use crate::ConfigError;
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Name of the aggregator provider
pub const OPENROUTER: &str = "openrouter";
/// Name of the DeepSeek provider
pub const DEEPSEEK: &str = "deepseek";
/// Name of the Anthropic provider
pub const ANTHROPIC: &str = "anthropic";

/// Top-level gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Provider used when a request does not select one
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Multi-model provider that absorbs `vendor/model` ids whose vendor is
    /// not registered directly
    #[serde(default = "default_provider")]
    pub aggregator_provider: String,

    /// Probe the default provider's health for requests that name no model
    /// and fall back to the first healthy provider
    #[serde(default)]
    pub health_aware_default: bool,

    /// Upstream providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Request quotas
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Response cache
    #[serde(default)]
    pub cache: CacheSettings,

    /// Retry policy
    #[serde(default)]
    pub retry: RetrySettings,

    /// Key-value store backing the limiter and cache
    #[serde(default)]
    pub store: StoreSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            aggregator_provider: default_provider(),
            health_aware_default: false,
            providers: Vec::new(),
            rate_limit: RateLimitSettings::default(),
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            store: StoreSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Enabled providers, in declaration order
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Look up a provider section by name
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Get or create the provider section with the given name
    pub fn provider_mut(&mut self, name: &str) -> &mut ProviderConfig {
        if let Some(idx) = self.providers.iter().position(|p| p.name == name) {
            &mut self.providers[idx]
        } else {
            self.providers.push(ProviderConfig::new(name));
            let last = self.providers.len() - 1;
            &mut self.providers[last]
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.global.validate("rate_limit.global")?;
        self.rate_limit.provider.validate("rate_limit.provider")?;

        if self.cache.enabled && self.cache.ttl.is_zero() {
            return Err(ConfigError::invalid("cache.ttl", "must be greater than zero"));
        }

        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::invalid("providers[].name", "cannot be empty"));
            }
            if let Some(ref base_url) = provider.base_url {
                url::Url::parse(base_url).map_err(|e| {
                    ConfigError::invalid(format!("providers.{}.base_url", provider.name), e.to_string())
                })?;
            }
        }

        let mut enabled = self.enabled_providers().peekable();
        if enabled.peek().is_some()
            && !self
                .enabled_providers()
                .any(|p| p.name == self.default_provider)
        {
            return Err(ConfigError::UnknownDefaultProvider(
                self.default_provider.clone(),
            ));
        }

        Ok(())
    }
}

/// Configuration for one upstream provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider name; selects the adapter
    pub name: String,

    /// Whether the provider is registered at startup
    #[serde(default = "enabled")]
    pub enabled: bool,

    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Override of the vendor base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model used when the caller names none
    #[serde(default)]
    pub default_model: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How long fetched model parameters stay fresh
    #[serde(default = "default_parameter_ttl", with = "humantime_serde")]
    pub parameter_cache_ttl: Duration,

    /// Sent as `HTTP-Referer` by the aggregator
    #[serde(default)]
    pub site_url: Option<String>,

    /// Sent as `X-Title` by the aggregator
    #[serde(default)]
    pub site_name: Option<String>,

    /// Static model list reported by `list_models`; empty means the
    /// built-in list for the provider
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    /// Create a provider section with defaults
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            api_key: None,
            api_key_env: None,
            base_url: None,
            default_model: None,
            timeout: default_timeout(),
            parameter_cache_ttl: default_parameter_ttl(),
            site_url: None,
            site_name: None,
            models: Vec::new(),
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the parameter cache TTL
    #[must_use]
    pub fn with_parameter_cache_ttl(mut self, ttl: Duration) -> Self {
        self.parameter_cache_ttl = ttl;
        self
    }

    /// The API key, read from `api_key` or else from `api_key_env`
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<SecretString> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok())
                .map(SecretString::new)
        })
    }
}

/// Sliding-window quotas
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Applies to every request of a subject
    #[serde(default = "WindowSettings::global")]
    pub global: WindowSettings,
    /// Applies per subject and provider
    #[serde(default = "WindowSettings::provider")]
    pub provider: WindowSettings,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            global: WindowSettings::global(),
            provider: WindowSettings::provider(),
        }
    }
}

/// One sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowSettings {
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Requests admitted per window
    pub max_requests: u32,
}

impl WindowSettings {
    /// 100 requests per minute
    #[must_use]
    pub fn global() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }

    /// 1000 requests per hour
    #[must_use]
    pub fn provider() -> Self {
        Self {
            window: Duration::from_secs(3600),
            max_requests: 1000,
        }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.window.as_millis() == 0 {
            return Err(ConfigError::invalid(format!("{field}.window"), "must be at least 1ms"));
        }
        if self.max_requests == 0 {
            return Err(ConfigError::invalid(
                format!("{field}.max_requests"),
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Response cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Whether completed responses are cached
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Entry lifetime
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: default_cache_ttl(),
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Unit of the `2^attempt` backoff
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on one backoff
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

/// Key-value store settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
    /// Redis URL; the in-memory store is used when absent
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_provider() -> String {
    OPENROUTER.to_string()
}

fn enabled() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_parameter_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_log_level() -> String {
    "info".to_string()
}
