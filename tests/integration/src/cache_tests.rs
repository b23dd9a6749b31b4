//! Cache integration tests
//!
//! Tests for caching behavior including cache hits, misses, TTL expiry and
//! what is never cached.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::DEEPSEEK;
use gateway_core::{ChatMessage, ErrorKind, LLMProvider, RequestOptions};
use gateway_resilience::{fingerprint, KeyValueStore, ResponseCache};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn cached_keys(harness: &TestGateway) -> Vec<String> {
    harness.store.keys("llm:cache:*").await.unwrap()
}

/// Test cache hit returns same response without reaching the upstream
#[tokio::test]
async fn test_cache_hit() {
    let upstream = MockDeepSeek::new().await;
    upstream.mock_chat_completion("deepseek-chat", "4").await;
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .builtin(&deepseek_config(&upstream.url()))
        .await
        .build();

    let messages = vec![ChatMessage::user("What is 2+2?")];
    let first = harness
        .gateway
        .complete("user-1", &messages, &RequestOptions::new())
        .await
        .unwrap();
    let second = harness
        .gateway
        .complete("user-1", &messages, &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(first.text, "4");
    assert_eq!(second.text, first.text);
    assert_eq!(second.usage, first.usage);
    assert_eq!(upstream.completion_calls().await, 1);
    assert_eq!(harness.metrics.cache_hits_total(DEEPSEEK), 1);
    assert_eq!(cached_keys(&harness).await.len(), 1);
}

/// Test the entry is stored under the fingerprint of the resolved options
#[tokio::test]
async fn test_cache_key_uses_resolved_options() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    let messages = simple_conversation();
    harness
        .gateway
        .complete("user-1", &messages, &RequestOptions::new())
        .await
        .unwrap();

    let resolved = provider.resolve_options(&RequestOptions::new()).await;
    let key = ResponseCache::key(&fingerprint(DEEPSEEK, &messages, &resolved));
    assert_eq!(cached_keys(&harness).await, vec![key]);
}

/// Test different requests don't share cache
#[tokio::test]
async fn test_cache_different_requests() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    let first = harness
        .gateway
        .complete("user-1", &[ChatMessage::user("What is 2+2?")], &RequestOptions::new())
        .await
        .unwrap();
    let second = harness
        .gateway
        .complete("user-1", &[ChatMessage::user("What is 3+3?")], &RequestOptions::new())
        .await
        .unwrap();

    assert_ne!(first.text, second.text);
    assert_eq!(provider.calls(), 2);
}

/// Test different roles with the same content don't share cache
#[tokio::test]
async fn test_cache_distinguishes_roles() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    for messages in [
        vec![ChatMessage::user("Be brief.")],
        vec![ChatMessage::system("Be brief.")],
    ] {
        harness
            .gateway
            .complete("user-1", &messages, &RequestOptions::new())
            .await
            .unwrap();
    }

    assert_eq!(provider.calls(), 2);
}

/// Test temperature affects cache key
#[tokio::test]
async fn test_cache_different_temperature() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    for temperature in [0.0, 0.7, 0.7] {
        harness
            .gateway
            .complete(
                "user-1",
                &simple_conversation(),
                &RequestOptions::new().with_temperature(temperature),
            )
            .await
            .unwrap();
    }

    assert_eq!(provider.calls(), 2);
}

/// Test entries expire after their TTL
#[tokio::test]
async fn test_cache_ttl_expiry() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .cache_ttl(Duration::from_secs(60))
        .build();

    let messages = vec![ChatMessage::user("ttl")];
    let options = RequestOptions::new();
    let complete = || harness.gateway.complete("user-1", &messages, &options);

    complete().await.unwrap();
    harness.clock.advance(Duration::from_secs(59));
    complete().await.unwrap();
    assert_eq!(provider.calls(), 1);

    harness.clock.advance(Duration::from_secs(2));
    complete().await.unwrap();
    assert_eq!(provider.calls(), 2);
}

/// Test failures are never cached
#[tokio::test]
async fn test_failures_not_cached() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    provider.fail_next(ErrorKind::ContextLength, 1);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    let first = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await;
    assert_kind(&first, ErrorKind::ContextLength);
    assert!(cached_keys(&harness).await.is_empty());

    harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(provider.calls(), 2);
}

/// Test streamed responses bypass the cache
#[tokio::test]
async fn test_streams_not_cached() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    for _ in 0..2 {
        let stream = harness
            .gateway
            .complete_stream("user-1", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
        collect_events(stream).await;
    }

    assert_eq!(provider.calls(), 2);
    assert!(cached_keys(&harness).await.is_empty());
}

/// Test a disabled cache always dispatches
#[tokio::test]
async fn test_cache_disabled() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .without_cache()
        .build();

    for _ in 0..3 {
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
    }

    assert_eq!(provider.calls(), 3);
    assert!(cached_keys(&harness).await.is_empty());
}

/// Test a corrupt entry is treated as a miss and replaced
#[tokio::test]
async fn test_corrupt_entry_is_replaced() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .build();

    let messages = simple_conversation();
    let resolved = provider.resolve_options(&RequestOptions::new()).await;
    let key = ResponseCache::key(&fingerprint(DEEPSEEK, &messages, &resolved));
    harness
        .store
        .set(&key, "{not json", Duration::from_secs(60))
        .await
        .unwrap();

    let result = harness
        .gateway
        .complete("user-1", &messages, &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    let stored = harness.store.get(&key).await.unwrap().unwrap();
    assert!(stored.contains(&result.text));
}

#[cfg(test)]
mod redis_cache_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use gateway_core::{CompletionResult, Usage};
    use gateway_resilience::{RateLimitConfig, RateLimiter, RateScope, RedisStore, WindowLimit};

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    async fn redis_store() -> Arc<dyn KeyValueStore> {
        Arc::new(
            RedisStore::connect(&redis_url())
                .await
                .expect("Failed to connect to Redis"),
        )
    }

    /// Test basic store operations (requires Redis running)
    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_store_operations() {
        let store = redis_store().await;
        let key = format!("llm-gateway:test:{}", uuid::Uuid::new_v4());

        store.set(&key, "test_value", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("test_value"));
        assert_eq!(store.keys(&key).await.unwrap(), vec![key.clone()]);

        store.del(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    /// Test cache round trip through Redis (requires Redis)
    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_cache_round_trip() {
        let cache = ResponseCache::new(redis_store().await);
        let fp = fingerprint(
            DEEPSEEK,
            &[ChatMessage::user(uuid::Uuid::new_v4().to_string())],
            &RequestOptions::new(),
        );
        let result = CompletionResult::new("Cached response", Usage::new(3, 2), "deepseek-chat", DEEPSEEK, 12);

        cache.put(&fp, &result, Duration::from_secs(60)).await;
        let cached = cache.get(&fp).await.unwrap();
        assert_eq!(cached.text, "Cached response");
        assert_eq!(cached.usage, Usage::new(3, 2));

        cache.invalidate(&fp).await;
        assert!(cache.get(&fp).await.is_none());
    }

    /// Test cache TTL expiration (requires Redis)
    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_cache_ttl() {
        let store = redis_store().await;
        let key = format!("llm-gateway:test:ttl:{}", uuid::Uuid::new_v4());

        store.set(&key, "short-lived", Duration::from_secs(1)).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(&key).await.unwrap().is_none());
    }

    /// Test rate limiting over a shared Redis store (requires Redis)
    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_rate_limit() {
        let limiter = RateLimiter::new(
            redis_store().await,
            RateLimitConfig {
                global: WindowLimit::new(Duration::from_secs(60), 3),
                provider: WindowLimit::new(Duration::from_secs(60), 3),
            },
        );
        let subject = uuid::Uuid::new_v4().to_string();

        for _ in 0..3 {
            assert!(limiter.check(&subject, RateScope::Global).await.unwrap().allowed);
        }
        let decision = limiter.check(&subject, RateScope::Global).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(limiter.remaining_requests(&subject, RateScope::Global).await.unwrap(), 0);
    }
}
