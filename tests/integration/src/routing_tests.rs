//! Routing integration tests
//!
//! Tests for request routing: vendor-prefixed model ids, the aggregator
//! fallback, the default provider and health-aware selection.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::{ANTHROPIC, DEEPSEEK, OPENROUTER};
use gateway_core::{ErrorKind, RequestOptions};
use pretty_assertions::assert_eq;

/// Test a vendor prefix with its own adapter goes there, prefix stripped
#[tokio::test]
async fn test_vendor_prefix_routes_to_vendor() {
    let openrouter = MockOpenRouter::new().await;
    let deepseek = MockDeepSeek::new().await;
    deepseek.mock_chat_completion("deepseek-coder", "fn main() {}").await;

    let harness = TestGatewayBuilder::new(OPENROUTER)
        .builtin(&openrouter_config(&openrouter.url()))
        .await
        .builtin(&deepseek_config(&deepseek.url()))
        .await
        .build();

    let result = harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("deepseek/deepseek-coder"),
        )
        .await
        .unwrap();

    assert_eq!(result.metadata.provider, DEEPSEEK);
    assert_eq!(deepseek.completion_bodies().await[0]["model"], "deepseek-coder");
    assert_eq!(openrouter.completion_calls().await, 0);
}

/// Test a vendor without an adapter goes to the aggregator with the full id
#[tokio::test]
async fn test_unknown_vendor_routes_to_aggregator() {
    let openrouter = MockOpenRouter::new().await;
    openrouter
        .mock_chat_completion("meta-llama/llama-3-70b-instruct", "Hello!")
        .await;
    let deepseek = MockDeepSeek::new().await;

    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .builtin(&openrouter_config(&openrouter.url()))
        .await
        .builtin(&deepseek_config(&deepseek.url()))
        .await
        .build();

    let result = harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("meta-llama/llama-3-70b-instruct"),
        )
        .await
        .unwrap();

    assert_eq!(result.metadata.provider, OPENROUTER);
    assert_eq!(
        openrouter.completion_bodies().await[0]["model"],
        "meta-llama/llama-3-70b-instruct"
    );
    assert_eq!(deepseek.completion_calls().await, 0);
}

/// Test an Anthropic-prefixed id reaches the Messages API when registered
#[tokio::test]
async fn test_anthropic_prefix_routes_to_anthropic() {
    let openrouter = MockOpenRouter::new().await;
    let anthropic = MockAnthropic::new().await;
    anthropic.mock_messages("claude-3-5-haiku-latest", "Hi").await;

    let harness = TestGatewayBuilder::new(OPENROUTER)
        .builtin(&openrouter_config(&openrouter.url()))
        .await
        .builtin(&anthropic_config(&anthropic.url()))
        .await
        .build();

    let result = harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("anthropic/claude-3-5-haiku-latest"),
        )
        .await
        .unwrap();

    assert_eq!(result.text, "Hi");
    assert_eq!(result.metadata.provider, ANTHROPIC);
    assert_eq!(
        anthropic.message_bodies().await[0]["model"],
        "claude-3-5-haiku-latest"
    );
    assert_eq!(openrouter.completion_calls().await, 0);
}

/// Test the same id goes through the aggregator when Anthropic is absent
#[tokio::test]
async fn test_anthropic_prefix_without_adapter_uses_aggregator() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .provider(ScriptedProvider::new(OPENROUTER))
        .await
        .build();

    let result = harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("anthropic/claude-3.5-sonnet"),
        )
        .await
        .unwrap();

    assert_eq!(result.metadata.provider, OPENROUTER);
    assert_eq!(result.metadata.model, "anthropic/claude-3.5-sonnet");
}

/// Test bare ids and no model go to the default provider
#[tokio::test]
async fn test_default_provider() {
    let deepseek = ScriptedProvider::new(DEEPSEEK);
    let openrouter = ScriptedProvider::new(OPENROUTER);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(deepseek.clone())
        .await
        .provider(openrouter.clone())
        .await
        .without_cache()
        .build();

    let defaulted = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    let bare = harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("deepseek-math"),
        )
        .await
        .unwrap();

    assert_eq!(defaulted.metadata.provider, DEEPSEEK);
    assert_eq!(defaulted.metadata.model, "scripted-model");
    assert_eq!(bare.metadata.provider, DEEPSEEK);
    assert_eq!(bare.metadata.model, "deepseek-math");
    assert_eq!(deepseek.calls(), 2);
    assert_eq!(openrouter.calls(), 0);
}

/// Test an unregistered default provider is a provider error
#[tokio::test]
async fn test_unregistered_default_provider() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(OPENROUTER))
        .await
        .build();

    let result = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await;

    assert_kind(&result, ErrorKind::ProviderError);
    let err = result.unwrap_err();
    assert_eq!(err.message(), "provider deepseek not found");
    assert_eq!(err.provider_name(), Some(DEEPSEEK));
}

/// Test health-aware selection skips an unhealthy default
#[tokio::test]
async fn test_health_aware_fallback() {
    let openrouter = MockOpenRouter::new().await;
    openrouter
        .mock_parameters("anthropic/claude-3.5-sonnet", serde_json::json!({}))
        .await;
    openrouter
        .mock_chat_completion("anthropic/claude-3.5-sonnet", "fallback answer")
        .await;
    let deepseek = ScriptedProvider::unhealthy(DEEPSEEK);

    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(deepseek.clone())
        .await
        .builtin(&openrouter_config(&openrouter.url()))
        .await
        .health_aware_default()
        .build();

    let result = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(result.text, "fallback answer");
    assert_eq!(result.metadata.provider, OPENROUTER);
    assert_eq!(deepseek.calls(), 0);
}

/// Test health-aware selection fails when nothing is healthy
#[tokio::test]
async fn test_no_healthy_provider() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::unhealthy(DEEPSEEK))
        .await
        .provider(ScriptedProvider::unhealthy(OPENROUTER))
        .await
        .health_aware_default()
        .build();

    let result = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await;

    assert_kind(&result, ErrorKind::ProviderError);
}

/// Test an explicit model bypasses health-aware selection
#[tokio::test]
async fn test_explicit_model_ignores_health() {
    let deepseek = ScriptedProvider::unhealthy(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(deepseek.clone())
        .await
        .provider(ScriptedProvider::new(OPENROUTER))
        .await
        .health_aware_default()
        .build();

    let result = harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("deepseek-chat"),
        )
        .await
        .unwrap();

    assert_eq!(result.metadata.provider, DEEPSEEK);
    assert_eq!(deepseek.calls(), 1);
}

/// Test provider and model queries
#[tokio::test]
async fn test_provider_queries() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .provider(ScriptedProvider::unhealthy(OPENROUTER))
        .await
        .build();

    assert_eq!(
        harness.gateway.list_providers(),
        vec![DEEPSEEK.to_string(), OPENROUTER.to_string()]
    );

    let health = harness.gateway.health_check().await;
    assert_eq!(health.get(DEEPSEEK), Some(&true));
    assert_eq!(health.get(OPENROUTER), Some(&false));

    let models = harness.gateway.list_models(DEEPSEEK).unwrap();
    assert!(models.contains(&"deepseek-chat".to_string()));

    // Unregistered but catalogued
    let anthropic = harness.gateway.list_models(ANTHROPIC).unwrap();
    assert!(anthropic.contains(&"claude-3-5-sonnet-latest".to_string()));

    let missing = harness.gateway.list_models("mistral");
    assert_kind(&missing, ErrorKind::ProviderError);
}

/// Test capability lookups by full id, bare id and alias
#[tokio::test]
async fn test_capabilities() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .build();

    let full = harness
        .gateway
        .capabilities("anthropic/claude-3.5-sonnet")
        .unwrap();
    assert_eq!(full.context_window, 200_000);
    assert_eq!(
        harness.gateway.capabilities("claude-3.5-sonnet"),
        Some(full.clone())
    );
    assert_eq!(
        harness.gateway.capabilities("claude-3-5-sonnet-latest"),
        Some(full)
    );
    assert_eq!(
        harness.gateway.capabilities("deepseek-chat"),
        harness.gateway.capabilities("deepseek/deepseek-v3")
    );
    assert!(harness.gateway.capabilities("no-such-model").is_none());
}
