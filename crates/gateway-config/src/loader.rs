//! Configuration loading.

use crate::config::{GatewayConfig, LogFormat, ANTHROPIC, DEEPSEEK, OPENROUTER};
use crate::ConfigError;
use secrecy::SecretString;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Load configuration from `GATEWAY_CONFIG` (if set) and the process
/// environment, then validate it.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, an environment
/// value is malformed, or validation fails
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) if !path.is_empty() => load_from_file(&path)?,
        _ => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse a YAML configuration file without validating it
///
/// # Errors
/// Returns an error if the file cannot be read or parsed
pub fn load_from_file(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading configuration file");
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Overlay environment variables on a configuration.
///
/// `lookup` returns the value of a variable; empty values are ignored.
/// Window variables are in milliseconds, `CACHE_TTL` is in seconds.
///
/// # Errors
/// Returns `InvalidValue` if a numeric variable does not parse
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("OPENROUTER_API_KEY") {
        config.provider_mut(OPENROUTER).api_key = Some(SecretString::new(key));
    }
    if let Some(key) = get("DEEPSEEK_API_KEY") {
        config.provider_mut(DEEPSEEK).api_key = Some(SecretString::new(key));
    }
    if let Some(key) = get("ANTHROPIC_API_KEY") {
        config.provider_mut(ANTHROPIC).api_key = Some(SecretString::new(key));
    }
    if let Some(site_url) = get("SITE_URL") {
        config.provider_mut(OPENROUTER).site_url = Some(site_url);
    }
    if let Some(site_name) = get("SITE_NAME") {
        config.provider_mut(OPENROUTER).site_name = Some(site_name);
    }
    if let Some(model) = get("DEEPSEEK_MODEL") {
        config.provider_mut(DEEPSEEK).default_model = Some(model);
    }
    if let Some(provider) = get("DEFAULT_LLM_PROVIDER") {
        config.default_provider = provider;
    }

    if let Some(v) = get("MAX_RETRIES") {
        config.retry.max_retries = parse("MAX_RETRIES", &v)?;
    }
    if let Some(v) = get("RATE_LIMIT_WINDOW") {
        config.rate_limit.global.window = Duration::from_millis(parse("RATE_LIMIT_WINDOW", &v)?);
    }
    if let Some(v) = get("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.global.max_requests = parse("RATE_LIMIT_MAX_REQUESTS", &v)?;
    }
    if let Some(v) = get("RATE_LIMIT_PROVIDER_WINDOW") {
        config.rate_limit.provider.window =
            Duration::from_millis(parse("RATE_LIMIT_PROVIDER_WINDOW", &v)?);
    }
    if let Some(v) = get("RATE_LIMIT_PROVIDER_MAX_REQUESTS") {
        config.rate_limit.provider.max_requests = parse("RATE_LIMIT_PROVIDER_MAX_REQUESTS", &v)?;
    }
    if let Some(v) = get("CACHE_TTL") {
        config.cache.ttl = Duration::from_secs(parse("CACHE_TTL", &v)?);
    }

    if let Some(url) = get("REDIS_URL") {
        config.store.redis_url = Some(url);
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.logging.format = LogFormat::from_str(&format)
            .map_err(|reason| ConfigError::invalid("LOG_FORMAT", reason))?;
    }

    Ok(())
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{value}': {e}")))
}
