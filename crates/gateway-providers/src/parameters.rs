//! Per-model sampling defaults.
//!
//! Each adapter owns a [`ParameterCache`]. Entries carry their fetch time
//! and are checked for expiry on read; nothing runs in the background.
//! Fallback sets recorded after a failed fetch live for at most
//! [`FALLBACK_TTL`].

use gateway_core::RequestOptions;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Output budget used when a model's limit is unknown, and the cap otherwise
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Lifetime of a fallback set cached after a failed fetch
pub const FALLBACK_TTL: Duration = Duration::from_secs(60);

/// Default sampling parameters of one model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParameters {
    /// Temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Top-k sampling
    pub top_k: u32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Presence penalty
    pub presence_penalty: f32,
    /// Repetition penalty
    pub repetition_penalty: f32,
    /// Min-p sampling
    pub min_p: f32,
    /// Top-a sampling
    pub top_a: f32,
}

impl ModelParameters {
    /// Values used when a model's defaults cannot be fetched
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            frequency_penalty: 0.1,
            presence_penalty: 0.1,
            repetition_penalty: 1.1,
            min_p: 0.0,
            top_a: 0.0,
        }
    }

    /// Override the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override nucleus sampling
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Override both penalties
    #[must_use]
    pub fn with_penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = frequency;
        self.presence_penalty = presence;
        self
    }

    /// Fill every unset option from these defaults.
    ///
    /// `model` and `max_tokens` fill the corresponding fields when unset.
    /// Options already set by the caller are never changed.
    #[must_use]
    pub fn apply(&self, options: &RequestOptions, model: &str, max_tokens: u32) -> RequestOptions {
        let mut resolved = options.clone();
        resolved.model.get_or_insert_with(|| model.to_string());
        resolved.max_tokens.get_or_insert(max_tokens);
        resolved.temperature.get_or_insert(self.temperature);
        resolved.top_p.get_or_insert(self.top_p);
        resolved.top_k.get_or_insert(self.top_k);
        resolved.frequency_penalty.get_or_insert(self.frequency_penalty);
        resolved.presence_penalty.get_or_insert(self.presence_penalty);
        resolved.repetition_penalty.get_or_insert(self.repetition_penalty);
        resolved.min_p.get_or_insert(self.min_p);
        resolved.top_a.get_or_insert(self.top_a);
        resolved
    }
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Output budget for a model: its own limit capped at
/// [`DEFAULT_MAX_TOKENS`], or the default when unknown
#[must_use]
pub fn default_max_tokens(max_output_tokens: Option<u32>) -> u32 {
    max_output_tokens.map_or(DEFAULT_MAX_TOKENS, |m| m.min(DEFAULT_MAX_TOKENS))
}

/// p50 parameter statistics as reported by the aggregator.
///
/// Missing fields take the fallback value.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RemoteParameters {
    #[serde(default)]
    temperature_p50: Option<f32>,
    #[serde(default)]
    top_p_p50: Option<f32>,
    #[serde(default)]
    top_k_p50: Option<f64>,
    #[serde(default)]
    frequency_penalty_p50: Option<f32>,
    #[serde(default)]
    presence_penalty_p50: Option<f32>,
    #[serde(default)]
    repetition_penalty_p50: Option<f32>,
    #[serde(default)]
    min_p_p50: Option<f32>,
    #[serde(default)]
    top_a_p50: Option<f32>,
}

/// The aggregator wraps the statistics in `data`; accept both shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RemoteParametersEnvelope {
    Wrapped { data: RemoteParameters },
    Flat(RemoteParameters),
}

impl RemoteParametersEnvelope {
    pub(crate) fn into_parameters(self) -> ModelParameters {
        let remote = match self {
            Self::Wrapped { data } | Self::Flat(data) => data,
        };
        let fallback = ModelParameters::fallback();
        ModelParameters {
            temperature: remote.temperature_p50.unwrap_or(fallback.temperature),
            top_p: remote.top_p_p50.unwrap_or(fallback.top_p),
            top_k: remote
                .top_k_p50
                .map_or(fallback.top_k, |k| k.max(0.0).round() as u32),
            frequency_penalty: remote
                .frequency_penalty_p50
                .unwrap_or(fallback.frequency_penalty),
            presence_penalty: remote
                .presence_penalty_p50
                .unwrap_or(fallback.presence_penalty),
            repetition_penalty: remote
                .repetition_penalty_p50
                .unwrap_or(fallback.repetition_penalty),
            min_p: remote.min_p_p50.unwrap_or(fallback.min_p),
            top_a: remote.top_a_p50.unwrap_or(fallback.top_a),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedParameters {
    parameters: ModelParameters,
    fetched_at: Instant,
    ttl: Duration,
}

/// Model to parameters, with lazy expiry
#[derive(Debug)]
pub struct ParameterCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedParameters>>,
}

impl ParameterCache {
    /// Create a cache whose entries live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh parameters for `model`, if any. An expired entry is evicted.
    pub fn get(&self, model: &str) -> Option<ModelParameters> {
        {
            let entries = self.entries.read();
            match entries.get(model) {
                Some(entry) if entry.fetched_at.elapsed() < entry.ttl => {
                    return Some(entry.parameters);
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().remove(model);
        None
    }

    /// Record freshly fetched parameters
    pub fn insert(&self, model: impl Into<String>, parameters: ModelParameters) {
        self.insert_for(model.into(), parameters, self.ttl);
    }

    /// Record the fallback set for a model whose fetch failed, so the next
    /// fetch waits [`FALLBACK_TTL`] (or the cache TTL, if shorter)
    pub fn insert_fallback(&self, model: impl Into<String>) {
        self.insert_for(
            model.into(),
            ModelParameters::fallback(),
            FALLBACK_TTL.min(self.ttl),
        );
    }

    fn insert_for(&self, model: String, parameters: ModelParameters, ttl: Duration) {
        self.entries.write().insert(
            model,
            CachedParameters {
                parameters,
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of entries, fresh or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry lifetime
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for ParameterCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}
