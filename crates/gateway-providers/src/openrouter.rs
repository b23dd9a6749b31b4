//! OpenRouter aggregator adapter.
//!
//! OpenRouter fronts many vendors behind one OpenAI-compatible API and
//! publishes p50 sampling statistics per model under
//! `GET /parameters/{model}`, which this adapter uses as request defaults.

use crate::catalog;
use crate::openai_compat::{
    bearer_headers, delta_stream, elapsed_ms, extract_chat_delta, http_client, send, send_json,
    ChatRequest, ChatResponse, ModelList,
};
use crate::parameters::{default_max_tokens, ModelParameters, ParameterCache, RemoteParametersEnvelope};
use async_trait::async_trait;
use gateway_config::{ProviderConfig, OPENROUTER};
use gateway_core::{
    ChatMessage, CompletionResult, CompletionStream, GatewayError, GatewayResult, LLMProvider,
    ModelCapabilities, RequestOptions,
};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default API root
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model used when the caller names none
pub const DEFAULT_OPENROUTER_MODEL: &str = "anthropic/claude-3.5-sonnet";

/// OpenRouter provider implementation
pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
    default_model: String,
    parameters: ParameterCache,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterProvider {
    /// Create the adapter
    ///
    /// # Errors
    /// Returns `ProviderError` if no API key is configured or the HTTP
    /// client cannot be built
    pub fn new(config: &ProviderConfig) -> GatewayResult<Self> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            GatewayError::provider("API key not configured").for_provider(OPENROUTER)
        })?;

        let headers = bearer_headers(
            OPENROUTER,
            api_key.expose_secret(),
            &[
                ("http-referer", config.site_url.as_deref().unwrap_or_default()),
                ("x-title", config.site_name.as_deref().unwrap_or_default()),
            ],
        )?;
        let client = http_client(OPENROUTER, headers, config.timeout)?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            parameters: ParameterCache::new(config.parameter_cache_ttl),
        })
    }

    /// Constructor used by the provider table
    ///
    /// # Errors
    /// See [`OpenRouterProvider::new`]
    pub fn create(config: &ProviderConfig) -> GatewayResult<Arc<dyn LLMProvider>> {
        Ok(Arc::new(Self::new(config)?))
    }

    /// The per-model parameter cache
    #[must_use]
    pub fn parameter_cache(&self) -> &ParameterCache {
        &self.parameters
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// p50 defaults of a model, fetched at most once per TTL.
    ///
    /// A failed fetch yields the fallback set, cached briefly so a request
    /// and its retries do not each hit a failing endpoint.
    async fn model_parameters(&self, model: &str) -> ModelParameters {
        if let Some(parameters) = self.parameters.get(model) {
            return parameters;
        }

        let url = self.url(&format!("/parameters/{model}"));
        match send_json::<RemoteParametersEnvelope>(OPENROUTER, self.client.get(&url)).await {
            Ok(envelope) => {
                let parameters = envelope.into_parameters();
                self.parameters.insert(model, parameters);
                debug!(provider = OPENROUTER, model, "Fetched model parameters");
                parameters
            }
            Err(e) => {
                warn!(provider = OPENROUTER, model, error = %e, "Using fallback model parameters");
                self.parameters.insert_fallback(model);
                ModelParameters::fallback()
            }
        }
    }
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        OPENROUTER
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        catalog::capabilities(model)
    }

    async fn initialize(&self) -> GatewayResult<()> {
        if !self.health_check().await {
            return Err(GatewayError::provider("failed to initialize provider").for_provider(OPENROUTER));
        }
        self.model_parameters(&self.default_model).await;
        info!(provider = OPENROUTER, default_model = %self.default_model, "Provider initialized");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        send(OPENROUTER, self.client.get(self.url("/models")))
            .await
            .is_ok()
    }

    async fn resolve_options(&self, options: &RequestOptions) -> RequestOptions {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let parameters = self.model_parameters(&model).await;
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
        let model = resolved.model.clone().unwrap_or_else(|| self.default_model.clone());
        let body = ChatRequest::new(&model, messages, &resolved, false);

        debug!(provider = OPENROUTER, model = %model, "Sending chat completion request");
        let response: ChatResponse = send_json(
            OPENROUTER,
            self.client.post(self.url("/chat/completions")).json(&body),
        )
        .await?;
        let (text, usage) = response.into_parts(OPENROUTER)?;

        Ok(
            CompletionResult::new(text, usage, &model, OPENROUTER, elapsed_ms(started))
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
        let model = resolved.model.clone().unwrap_or_else(|| self.default_model.clone());
        let body = ChatRequest::new(&model, messages, &resolved, true);

        debug!(provider = OPENROUTER, model = %model, "Sending streaming chat completion request");
        let response = send(
            OPENROUTER,
            self.client.post(self.url("/chat/completions")).json(&body),
        )
        .await?;

        let capabilities = self.capabilities(&model);
        Ok(delta_stream(
            OPENROUTER,
            response,
            model,
            capabilities,
            started,
            extract_chat_delta,
        ))
    }

    async fn list_models(&self) -> GatewayResult<Vec<String>> {
        let list: ModelList = send_json(OPENROUTER, self.client.get(self.url("/models"))).await?;
        Ok(list.into_ids())
    }
}
