//! DeepSeek adapter (OpenAI-compatible API, built-in model defaults).

use crate::catalog;
use crate::openai_compat::{
    bearer_headers, delta_stream, elapsed_ms, extract_chat_delta, http_client, send, send_json,
    ChatRequest, ChatResponse, ModelList,
};
use crate::parameters::{default_max_tokens, ParameterCache};
use async_trait::async_trait;
use gateway_config::{ProviderConfig, DEEPSEEK};
use gateway_core::{
    ChatMessage, CompletionResult, CompletionStream, GatewayError, GatewayResult, LLMProvider,
    ModelCapabilities, RequestOptions,
};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default API root
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Model used when neither the caller nor the configuration names one
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

/// DeepSeek provider implementation
pub struct DeepSeekProvider {
    client: Client,
    base_url: String,
    default_model: String,
    parameters: ParameterCache,
}

impl std::fmt::Debug for DeepSeekProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeekProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl DeepSeekProvider {
    /// Create the adapter
    ///
    /// # Errors
    /// Returns `ProviderError` if no API key is configured or the HTTP
    /// client cannot be built
    pub fn new(config: &ProviderConfig) -> GatewayResult<Self> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            GatewayError::provider("API key not configured").for_provider(DEEPSEEK)
        })?;
        let headers = bearer_headers(DEEPSEEK, api_key.expose_secret(), &[])?;

        Ok(Self {
            client: http_client(DEEPSEEK, headers, config.timeout)?,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(DEEPSEEK_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            default_model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_DEEPSEEK_MODEL.to_string()),
            parameters: ParameterCache::new(config.parameter_cache_ttl),
        })
    }

    /// Constructor used by the provider table
    ///
    /// # Errors
    /// See [`DeepSeekProvider::new`]
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
impl LLMProvider for DeepSeekProvider {
    fn name(&self) -> &str {
        DEEPSEEK
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        catalog::capabilities(model)
    }

    async fn initialize(&self) -> GatewayResult<()> {
        if !self.health_check().await {
            return Err(GatewayError::provider("failed to initialize provider").for_provider(DEEPSEEK));
        }
        info!(provider = DEEPSEEK, default_model = %self.default_model, "Provider initialized");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        send(DEEPSEEK, self.client.get(self.url("/models")))
            .await
            .is_ok()
    }

    async fn resolve_options(&self, options: &RequestOptions) -> RequestOptions {
        let model = self.model_of(options);
        let parameters = self.parameters.get(&model).unwrap_or_else(|| {
            let parameters = catalog::deepseek_parameters(&model);
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
        let body = ChatRequest::new(&model, messages, &resolved, false).core_sampling_only();

        debug!(provider = DEEPSEEK, model = %model, "Sending chat completion request");
        let response: ChatResponse = send_json(
            DEEPSEEK,
            self.client.post(self.url("/chat/completions")).json(&body),
        )
        .await?;
        let (text, usage) = response.into_parts(DEEPSEEK)?;

        Ok(
            CompletionResult::new(text, usage, &model, DEEPSEEK, elapsed_ms(started))
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
        let body = ChatRequest::new(&model, messages, &resolved, true).core_sampling_only();

        let response = send(
            DEEPSEEK,
            self.client.post(self.url("/chat/completions")).json(&body),
        )
        .await?;

        let capabilities = self.capabilities(&model);
        Ok(delta_stream(
            DEEPSEEK,
            response,
            model,
            capabilities,
            started,
            extract_chat_delta,
        ))
    }

    async fn list_models(&self) -> GatewayResult<Vec<String>> {
        let list: ModelList = send_json(DEEPSEEK, self.client.get(self.url("/models"))).await?;
        Ok(list.into_ids())
    }
}
