//! Test fixtures and sample data for integration tests

use gateway_config::{ProviderConfig, ANTHROPIC, DEEPSEEK, OPENROUTER};
use gateway_core::ChatMessage;
use serde_json::{json, Value};
use std::time::Duration;

/// A single user turn
pub fn simple_conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::user("Hello, how are you?")]
}

/// A system prompt followed by a user turn
pub fn conversation_with_system(system: &str, user: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// A multi-turn conversation
pub fn multi_turn_conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("What is 2 + 2?"),
        ChatMessage::assistant("2 + 2 equals 4."),
        ChatMessage::user("And what is that multiplied by 3?"),
    ]
}

/// A conversation far beyond any context window
pub fn oversized_conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::user("lorem ipsum ".repeat(10_000))]
}

/// Adapter configuration pointing at a mock upstream
pub fn provider_config(name: &str, base_url: &str) -> ProviderConfig {
    ProviderConfig::new(name)
        .with_api_key(format!("test-{name}-key"))
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
}

/// OpenRouter configuration pointing at a mock upstream
pub fn openrouter_config(base_url: &str) -> ProviderConfig {
    provider_config(OPENROUTER, base_url)
}

/// DeepSeek configuration pointing at a mock upstream
pub fn deepseek_config(base_url: &str) -> ProviderConfig {
    provider_config(DEEPSEEK, base_url)
}

/// Anthropic configuration pointing at a mock upstream
pub fn anthropic_config(base_url: &str) -> ProviderConfig {
    provider_config(ANTHROPIC, base_url)
}

/// OpenAI-compatible chat completion response
pub fn chat_completion_response(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 12,
            "completion_tokens": 8,
            "total_tokens": 20
        }
    })
}

/// OpenAI-compatible streaming body: one frame per piece, then `[DONE]`
pub fn chat_stream_body(pieces: &[&str]) -> String {
    let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for piece in pieces {
        let frame = json!({"choices": [{"delta": {"content": piece}}]});
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}

/// OpenAI-compatible error body
pub fn error_response(message: &str) -> Value {
    json!({
        "error": {
            "message": message,
            "type": "invalid_request_error",
            "code": null
        }
    })
}

/// Model listing in the `{data: [{id}]}` shape all three vendors use
pub fn models_response(ids: &[&str]) -> Value {
    let data: Vec<Value> = ids.iter().map(|id| json!({"id": id, "object": "model"})).collect();
    json!({"object": "list", "data": data})
}

/// Anthropic Messages API response
pub fn anthropic_message_response(model: &str, content: &str) -> Value {
    json!({
        "id": "msg_test123",
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": [{"type": "text", "text": content}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 9, "output_tokens": 4}
    })
}

/// Anthropic streaming body with one text delta per piece
pub fn anthropic_stream_body(pieces: &[&str]) -> String {
    let mut body = String::from(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_test123\"}}\n\n\
         event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    );
    for piece in pieces {
        let frame = json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": piece}
        });
        body.push_str(&format!("event: content_block_delta\ndata: {frame}\n\n"));
    }
    body.push_str("event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n");
    body.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    body
}

/// Anthropic error body
pub fn anthropic_error_response(error_type: &str, message: &str) -> Value {
    json!({
        "type": "error",
        "error": {"type": error_type, "message": message}
    })
}
