//! Rate limiting integration tests
//!
//! Tests for sliding-window admission: per-subject global limits,
//! per-provider limits, window expiry and the caller-facing error.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::{DEEPSEEK, OPENROUTER};
use gateway_core::{ErrorKind, GatewayError, RequestOptions};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn rejection<T: std::fmt::Debug>(result: gateway_core::GatewayResult<T>) -> GatewayError {
    match result {
        Err(err) => err,
        Ok(value) => panic!("expected a rate limit error, got {value:?}"),
    }
}

/// Test requests within the limit succeed
#[tokio::test]
async fn test_requests_within_limit() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .rate_limits(5, 100)
        .without_cache()
        .build();

    for _ in 0..5 {
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
    }
}

/// Test the 101st request in a minute is rejected and the window recovers
#[tokio::test]
async fn test_global_limit_and_window_expiry() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .rate_limits(100, 1000)
        .without_cache()
        .build();

    for _ in 0..100 {
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
    }

    let err = rejection(
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await,
    );
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.remaining_requests(), Some(0));
    assert_eq!(err.provider_name(), None);
    assert_eq!(provider.calls(), 100);

    harness.clock.advance(Duration::from_secs(61));
    harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(provider.calls(), 101);
}

/// Test the window slides instead of resetting on a fixed boundary
#[tokio::test]
async fn test_window_slides() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .rate_limits(2, 100)
        .without_cache()
        .build();
    let complete = || async {
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await
    };

    complete().await.unwrap();
    harness.clock.advance(Duration::from_secs(30));
    complete().await.unwrap();
    assert_kind(&complete().await, ErrorKind::RateLimit);

    // First request leaves the window; the second is still inside it
    harness.clock.advance(Duration::from_secs(31));
    complete().await.unwrap();
    assert_kind(&complete().await, ErrorKind::RateLimit);
}

/// Test subjects have independent quotas
#[tokio::test]
async fn test_subjects_are_isolated() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .rate_limits(3, 100)
        .without_cache()
        .build();

    for _ in 0..3 {
        harness
            .gateway
            .complete("user-a", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
    }
    let limited = harness
        .gateway
        .complete("user-a", &simple_conversation(), &RequestOptions::new())
        .await;
    assert_kind(&limited, ErrorKind::RateLimit);

    harness
        .gateway
        .complete("user-b", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
}

/// Test the provider window is counted per provider and names it
#[tokio::test]
async fn test_provider_limit() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .provider(ScriptedProvider::new(OPENROUTER))
        .await
        .rate_limits(100, 2)
        .without_cache()
        .build();

    for _ in 0..2 {
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
    }

    let err = rejection(
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await,
    );
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.provider_name(), Some(DEEPSEEK));
    assert!(err.message().contains(DEEPSEEK));

    // Another provider still has room
    harness
        .gateway
        .complete(
            "user-1",
            &simple_conversation(),
            &RequestOptions::new().with_model("meta-llama/llama-3-70b"),
        )
        .await
        .unwrap();
}

/// Test rejections are counted by scope
#[tokio::test]
async fn test_rejections_are_counted() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .rate_limits(1, 100)
        .without_cache()
        .build();

    for _ in 0..3 {
        let _ = harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await;
    }

    assert_eq!(harness.metrics.rate_limited_total("global"), 2);
    assert_eq!(harness.metrics.rate_limited_total("provider"), 0);
    assert_eq!(harness.metrics.requests_total(DEEPSEEK, "success"), 1);
}

/// Test the caller-facing error body
#[tokio::test]
async fn test_rate_limit_error_response() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .rate_limits(1, 100)
        .without_cache()
        .build();

    harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    let err = rejection(
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await,
    );

    let body = serde_json::to_value(err.to_response()).unwrap();
    assert_eq!(body["status"], 429);
    assert_eq!(body["code"], "RATE_LIMIT");
    assert_eq!(body["remaining_requests"], 0);
    assert!(body.get("provider").is_none());
}

/// Test cache hits still count against the quota
#[tokio::test]
async fn test_cache_hits_consume_quota() {
    let provider = ScriptedProvider::new(DEEPSEEK);
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(provider.clone())
        .await
        .rate_limits(2, 100)
        .build();

    for _ in 0..2 {
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await
            .unwrap();
    }
    let limited = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await;

    assert_kind(&limited, ErrorKind::RateLimit);
    assert_eq!(provider.calls(), 1);
}

/// Test streams and blocking calls share the quota
#[tokio::test]
async fn test_streams_share_quota() {
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .provider(ScriptedProvider::new(DEEPSEEK))
        .await
        .rate_limits(2, 100)
        .without_cache()
        .build();

    harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    let stream = harness
        .gateway
        .complete_stream("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    collect_events(stream).await;

    let limited = harness
        .gateway
        .complete_stream("user-1", &simple_conversation(), &RequestOptions::new())
        .await;
    match limited {
        Err(err) => assert_eq!(err.kind(), ErrorKind::RateLimit),
        Ok(_) => panic!("stream should be rate limited"),
    }
}

/// Test the gateway limiter rejects before the upstream is reached
#[tokio::test]
async fn test_rejected_requests_never_reach_upstream() {
    let upstream = MockDeepSeek::new().await;
    upstream.mock_chat_completion("deepseek-chat", "ok").await;
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .builtin(&deepseek_config(&upstream.url()))
        .await
        .rate_limits(1, 100)
        .without_cache()
        .build();

    harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await
        .unwrap();
    let limited = harness
        .gateway
        .complete("user-1", &simple_conversation(), &RequestOptions::new())
        .await;

    assert_kind(&limited, ErrorKind::RateLimit);
    assert_eq!(upstream.completion_calls().await, 1);
}

/// Test a vendor 429 surfaces as a rate limit error without retries
#[tokio::test]
async fn test_upstream_rate_limit_not_retried() {
    let upstream = MockDeepSeek::new().await;
    upstream.mock_error(429, "Rate limit reached for requests").await;
    let harness = TestGatewayBuilder::new(DEEPSEEK)
        .builtin(&deepseek_config(&upstream.url()))
        .await
        .build();

    let err = rejection(
        harness
            .gateway
            .complete("user-1", &simple_conversation(), &RequestOptions::new())
            .await,
    );

    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.provider_name(), Some(DEEPSEEK));
    assert_eq!(err.remaining_requests(), None);
    assert_eq!(upstream.completion_calls().await, 1);
}
