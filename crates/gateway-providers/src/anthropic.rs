//! Anthropic Messages API adapter.
//!
//! System messages are lifted out of the conversation into the top-level
//! `system` field. The stream is a sequence of typed events of which only
//! `content_block_delta` carrying a `text_delta` produces output.

use crate::catalog;
use crate::openai_compat::{delta_stream, elapsed_ms, header_value, http_client, send, send_json, ModelList};
use crate::parameters::{default_max_tokens, ParameterCache};
use async_trait::async_trait;
use gateway_config::{ProviderConfig, ANTHROPIC};
use gateway_core::{
    ChatMessage, CompletionResult, CompletionStream, GatewayError, GatewayResult, LLMProvider,
    MessageRole, ModelCapabilities, RequestOptions, Usage,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default API root
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Model used when neither the caller nor the configuration names one
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";

/// Pinned API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider implementation
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    default_model: String,
    parameters: ParameterCache,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl AnthropicProvider {
    /// Create the adapter
    ///
    /// # Errors
    /// Returns `ProviderError` if no API key is configured or the HTTP
    /// client cannot be built
    pub fn new(config: &ProviderConfig) -> GatewayResult<Self> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            GatewayError::provider("API key not configured").for_provider(ANTHROPIC)
        })?;

        let mut headers = HeaderMap::new();
        let mut key = header_value(ANTHROPIC, "x-api-key", api_key.expose_secret())?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: http_client(ANTHROPIC, headers, config.timeout)?,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            default_model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            parameters: ParameterCache::new(config.parameter_cache_ttl),
        })
    }

    /// Constructor used by the provider table
    ///
    /// # Errors
    /// See [`AnthropicProvider::new`]
    pub fn create(config: &ProviderConfig) -> GatewayResult<Arc<dyn LLMProvider>> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn model_of(&self, options: &RequestOptions) -> String {
        options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        ANTHROPIC
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        catalog::capabilities(model)
    }

    async fn initialize(&self) -> GatewayResult<()> {
        if !self.health_check().await {
            return Err(GatewayError::provider("failed to initialize provider").for_provider(ANTHROPIC));
        }
        info!(provider = ANTHROPIC, default_model = %self.default_model, "Provider initialized");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        send(ANTHROPIC, self.client.get(self.url("/models")))
            .await
            .is_ok()
    }

    async fn resolve_options(&self, options: &RequestOptions) -> RequestOptions {
        let model = self.model_of(options);
        let parameters = self.parameters.get(&model).unwrap_or_else(|| {
            let parameters = catalog::anthropic_parameters(&model);
            self.parameters.insert(model.as_str(), parameters);
            parameters
        });
        let max_tokens =
            default_max_tokens(self.capabilities(&model).and_then(|c| c.max_output_tokens));
        parameters.apply(options, &model, max_tokens)
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionResult> {
        let started = Instant::now();
        let resolved = self.resolve_options(options).await;
        let model = self.model_of(&resolved);
        let body = MessagesRequest::new(&model, messages, &resolved, false);

        debug!(provider = ANTHROPIC, model = %model, "Sending messages request");
        let response: MessagesResponse = send_json(
            ANTHROPIC,
            self.client.post(self.url("/messages")).json(&body),
        )
        .await?;

        let text = response.text();
        let usage = Usage::new(response.usage.input_tokens, response.usage.output_tokens);
        Ok(
            CompletionResult::new(text, usage, &model, ANTHROPIC, elapsed_ms(started))
                .with_capabilities(self.capabilities(&model)),
        )
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionStream> {
        let started = Instant::now();
        let resolved = self.resolve_options(options).await;
        let model = self.model_of(&resolved);
        let body = MessagesRequest::new(&model, messages, &resolved, true);

        let response = send(
            ANTHROPIC,
            self.client.post(self.url("/messages")).json(&body),
        )
        .await?;

        let capabilities = self.capabilities(&model);
        Ok(delta_stream(
            ANTHROPIC,
            response,
            model,
            capabilities,
            started,
            extract_text_delta,
        ))
    }

    async fn list_models(&self) -> GatewayResult<Vec<String>> {
        let list: ModelList = send_json(ANTHROPIC, self.client.get(self.url("/models"))).await?;
        Ok(list.into_ids())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

impl<'a> MessagesRequest<'a> {
    fn new(
        model: &'a str,
        messages: &'a [ChatMessage],
        options: &'a RequestOptions,
        stream: bool,
    ) -> Self {
        let mut system: Vec<String> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone())
            .collect();
        if let Some(schema) = &options.response_schema {
            system.push(format!(
                "Respond only with a JSON document that conforms to this JSON schema:\n{schema}"
            ));
        }

        Self {
            model,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens: options.max_tokens.unwrap_or(crate::parameters::DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            stop_sequences: options.stop.as_deref().filter(|s| !s.is_empty()),
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: MessagesUsage,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEventFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(rename = "type")]
    delta_type: String,
    #[serde(default)]
    text: Option<String>,
}

fn extract_text_delta(data: &str) -> Option<String> {
    let frame: StreamEventFrame = serde_json::from_str(data).ok()?;
    if frame.event_type != "content_block_delta" {
        return None;
    }
    let delta = frame.delta?;
    if delta.delta_type != "text_delta" {
        return None;
    }
    delta.text.filter(|t| !t.is_empty())
}
