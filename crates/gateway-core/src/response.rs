//! Response types for the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed (or partial, when streamed) completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    /// Generated text
    pub text: String,
    /// Token usage; zero for individual streamed chunks
    pub usage: Usage,
    /// Provenance and timing
    pub metadata: CompletionMetadata,
}

impl CompletionResult {
    /// Create a result stamped with the current time
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        usage: Usage,
        model: impl Into<String>,
        provider: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            text: text.into(),
            usage,
            metadata: CompletionMetadata {
                model: model.into(),
                provider: provider.into(),
                latency_ms,
                timestamp: Utc::now(),
                capabilities: None,
            },
        }
    }

    /// Attach static model capabilities
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Option<ModelCapabilities>) -> Self {
        self.metadata.capabilities = capabilities;
        self
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage from prompt and completion counts
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Usage reported on streamed chunks
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Completion metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMetadata {
    /// Model that produced the text
    pub model: String,
    /// Provider that served the request
    pub provider: String,
    /// Elapsed milliseconds
    pub latency_ms: u64,
    /// Production time
    pub timestamp: DateTime<Utc>,
    /// Static model capabilities, when catalogued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ModelCapabilities>,
}

/// Static per-model reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    /// Context window in tokens
    pub context_window: u32,
    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Price in USD per million tokens
    pub pricing: ModelPricing,
    /// Qualitative strengths
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Typical use cases
    #[serde(default)]
    pub use_cases: Vec<String>,
    /// Accepts non-text input
    #[serde(default)]
    pub multimodal: bool,
}

/// Model pricing in USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Input price
    pub input: f64,
    /// Output price
    pub output: f64,
    /// Per-thousand-images price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<f64>,
}
