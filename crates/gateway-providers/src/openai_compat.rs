//! Client for OpenAI-compatible chat APIs, shared by the OpenRouter and
//! DeepSeek adapters.

use crate::error::{classify_decode, classify_http, classify_transport};
use crate::sse::{SseFrame, SseLineDecoder};
use async_stream::try_stream;
use futures_util::StreamExt;
use gateway_core::{
    ChatMessage, CompletionResult, CompletionStream, GatewayError, GatewayResult,
    ModelCapabilities, RequestOptions, Usage,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Build a header value, rejecting control characters
pub(crate) fn header_value(provider: &str, name: &str, value: &str) -> GatewayResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        GatewayError::provider(format!("invalid value for header {name}"))
            .for_provider(provider)
            .with_source(e)
    })
}

/// Default headers for bearer-authenticated JSON APIs
pub(crate) fn bearer_headers(
    provider: &str,
    api_key: &str,
    extra: &[(&'static str, &str)],
) -> GatewayResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut auth = header_value(provider, "Authorization", &format!("Bearer {api_key}"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in extra {
        if value.is_empty() {
            continue;
        }
        headers.insert(
            HeaderName::from_static(name),
            header_value(provider, name, value)?,
        );
    }
    Ok(headers)
}

/// Build the HTTP client used by an adapter
pub(crate) fn http_client(
    provider: &str,
    headers: HeaderMap,
    timeout: Duration,
) -> GatewayResult<Client> {
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .pool_max_idle_per_host(32)
        .build()
        .map_err(|e| {
            GatewayError::provider(format!("failed to create HTTP client: {e}"))
                .for_provider(provider)
        })
}

/// Send a request and classify any failure
pub(crate) async fn send(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> GatewayResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(provider, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    trace!(provider, status = status.as_u16(), body = %body, "Upstream error response");
    Err(classify_http(provider, status.as_u16(), &body))
}

/// Send a request and decode a JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> GatewayResult<T> {
    let response = send(provider, request).await?;
    let body = response
        .text()
        .await
        .map_err(|e| classify_transport(provider, e))?;
    serde_json::from_str(&body).map_err(|e| classify_decode(provider, e))
}

/// Turn an SSE response into a completion stream.
///
/// `extract` pulls the text delta out of one `data:` payload; frames it
/// rejects or that fail to parse are skipped.
pub(crate) fn delta_stream(
    provider: &'static str,
    response: reqwest::Response,
    model: String,
    capabilities: Option<ModelCapabilities>,
    started: Instant,
    extract: fn(&str) -> Option<String>,
) -> CompletionStream {
    let stream = try_stream! {
        let mut byte_stream = response.bytes_stream();
        let mut decoder = SseLineDecoder::new();
        let mut finished = false;

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| classify_transport(provider, e))?;
            for frame in decoder.push(&chunk) {
                match frame {
                    SseFrame::Done => {
                        finished = true;
                        break;
                    }
                    SseFrame::Data(data) => {
                        if let Some(text) = extract(&data) {
                            yield delta(text, &model, provider, started, &capabilities);
                        }
                    }
                }
            }
            if finished {
                break;
            }
        }

        if !finished {
            if let Some(SseFrame::Data(data)) = decoder.finish() {
                if let Some(text) = extract(&data) {
                    yield delta(text, &model, provider, started, &capabilities);
                }
            }
        }
        debug!(provider, model = %model, "Upstream stream finished");
    };

    Box::pin(stream)
}

fn delta(
    text: String,
    model: &str,
    provider: &str,
    started: Instant,
    capabilities: &Option<ModelCapabilities>,
) -> CompletionResult {
    CompletionResult::new(text, Usage::zero(), model, provider, elapsed_ms(started))
        .with_capabilities(capabilities.clone())
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// OpenAI-compatible `/chat/completions` body
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_a: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'static str,
    strict: bool,
    schema: &'a serde_json::Value,
}

impl<'a> ChatRequest<'a> {
    /// Body carrying every resolved option
    pub(crate) fn new(
        model: &'a str,
        messages: &'a [ChatMessage],
        options: &'a RequestOptions,
        stream: bool,
    ) -> Self {
        Self {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            top_k: options.top_k,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            repetition_penalty: options.repetition_penalty,
            min_p: options.min_p,
            top_a: options.top_a,
            stop: options.stop.as_deref().filter(|s| !s.is_empty()),
            response_format: options.response_schema.as_ref().map(|schema| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "response",
                    strict: true,
                    schema,
                },
            }),
            stream,
        }
    }

    /// Drop sampling fields outside the core OpenAI set
    pub(crate) fn core_sampling_only(mut self) -> Self {
        self.top_k = None;
        self.repetition_penalty = None;
        self.min_p = None;
        self.top_a = None;
        self
    }
}

/// `/chat/completions` response
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub(crate) model: Option<String>,
    pub(crate) choices: Vec<ChatChoice>,
    #[serde(default)]
    pub(crate) usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl From<ChatUsage> for Usage {
    fn from(u: ChatUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u
                .total_tokens
                .unwrap_or(u.prompt_tokens + u.completion_tokens),
        }
    }
}

impl ChatResponse {
    /// Text of the first choice
    ///
    /// # Errors
    /// Returns `Unknown` if the response carries no choices
    pub(crate) fn into_parts(self, provider: &str) -> GatewayResult<(String, Usage)> {
        let usage = self.usage.map(Usage::from).unwrap_or_default();
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            GatewayError::unknown("no choices in response").for_provider(provider)
        })?;
        Ok((choice.message.content.unwrap_or_default(), usage))
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Text delta of an OpenAI-style stream chunk; empty deltas are skipped
pub(crate) fn extract_chat_delta(data: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty())
}

/// `/models` listing
#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    data: Vec<ModelListEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelListEntry {
    id: String,
}

impl ModelList {
    pub(crate) fn into_ids(self) -> Vec<String> {
        self.data.into_iter().map(|m| m.id).collect()
    }
}
