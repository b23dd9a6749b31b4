//! # Gateway Config
//!
//! Configuration for the LLM Request Gateway.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file
//! named by `GATEWAY_CONFIG`, then environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod loader;

pub use config::{
    CacheSettings, GatewayConfig, LogFormat, LoggingSettings, ProviderConfig, RateLimitSettings,
    RetrySettings, StoreSettings, WindowSettings, ANTHROPIC, DEEPSEEK, OPENROUTER,
};
pub use loader::{apply_env_overrides, load_config, load_from_file};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range or malformed
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// What is wrong
        reason: String,
    },

    /// The default provider is not among the enabled providers
    #[error("default provider '{0}' is not configured")]
    UnknownDefaultProvider(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
