//! Request types for the gateway.
//!
//! This module defines the uniform request model shared by every provider
//! adapter: an ordered conversation plus optional sampling parameters.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};

/// Chat message with role and content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a message with an explicit role
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional sampling and shape parameters.
///
/// Every field left unset is filled from the defaults of the model that
/// serves the request (see `LLMProvider::resolve_options`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    /// Target model, either bare (`deepseek-chat`) or vendor-qualified
    /// (`anthropic/claude-3.5-sonnet`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Frequency penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Repetition penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    /// Minimum probability relative to the top token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,

    /// Top-a sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_a: Option<f32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// JSON schema for structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

impl RequestOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set top_p
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set top_k
    #[must_use]
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set stop sequences
    #[must_use]
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Set the structured-output schema
    #[must_use]
    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Vendor prefix of a qualified model id (`anthropic` for
    /// `anthropic/claude-3.5-sonnet`)
    #[must_use]
    pub fn model_vendor(&self) -> Option<&str> {
        self.model
            .as_deref()
            .and_then(|m| m.split_once('/'))
            .map(|(vendor, _)| vendor)
            .filter(|vendor| !vendor.is_empty())
    }

    /// Validate parameter ranges
    ///
    /// # Errors
    /// Returns `InvalidRequest` if any parameter is out of range
    pub fn validate(&self) -> Result<(), GatewayError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GatewayError::invalid_request(format!(
                    "temperature must be between 0.0 and 2.0, got {t}"
                )));
            }
        }

        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GatewayError::invalid_request(format!(
                    "top_p must be between 0.0 and 1.0, got {p}"
                )));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(GatewayError::invalid_request(
                "max_tokens must be greater than 0",
            ));
        }

        if let Some(fp) = self.frequency_penalty {
            if !(-2.0..=2.0).contains(&fp) {
                return Err(GatewayError::invalid_request(format!(
                    "frequency_penalty must be between -2.0 and 2.0, got {fp}"
                )));
            }
        }

        if let Some(pp) = self.presence_penalty {
            if !(-2.0..=2.0).contains(&pp) {
                return Err(GatewayError::invalid_request(format!(
                    "presence_penalty must be between -2.0 and 2.0, got {pp}"
                )));
            }
        }

        if matches!(self.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(GatewayError::invalid_request("model cannot be empty"));
        }

        Ok(())
    }
}

/// Validate a conversation before it is dispatched
///
/// # Errors
/// Returns `InvalidRequest` if the conversation is empty
pub fn validate_messages(messages: &[ChatMessage]) -> Result<(), GatewayError> {
    if messages.is_empty() {
        return Err(GatewayError::invalid_request("messages cannot be empty"));
    }
    Ok(())
}
