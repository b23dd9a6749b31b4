//! Mapping of upstream failures onto the gateway error taxonomy.

use gateway_core::{ErrorKind, GatewayError};
use serde::Deserialize;

/// Classify a non-success HTTP response.
///
/// Rules are checked in order:
///
/// | Condition | Kind |
/// |---|---|
/// | 401 / 403 | `ProviderError` |
/// | 429 | `RateLimit` |
/// | 400 / 413 / 422 mentioning context length | `ContextLength` |
/// | other 400 / 413 / 422 | `InvalidRequest` |
/// | 404 | `ModelNotFound` |
/// | 408 | `Timeout` |
/// | anything else | `Unknown` |
#[must_use]
pub fn classify_http(provider: &str, status: u16, body: &str) -> GatewayError {
    let message = extract_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", truncate(body.trim(), 512))
        }
    });

    let kind = match status {
        401 | 403 => ErrorKind::ProviderError,
        429 => ErrorKind::RateLimit,
        400 | 413 | 422 if mentions_context_length(&message) => ErrorKind::ContextLength,
        400 | 413 | 422 => ErrorKind::InvalidRequest,
        404 => ErrorKind::ModelNotFound,
        408 => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    };

    let message = match status {
        401 => format!("invalid API key: {message}"),
        403 => format!("access denied: {message}"),
        429 => format!("upstream rate limit exceeded: {message}"),
        _ => message,
    };

    GatewayError::new(kind, message).for_provider(provider)
}

/// Classify a transport failure (connect, timeout, body read)
#[must_use]
pub fn classify_transport(provider: &str, error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::timeout(format!("request timed out: {error}"))
            .for_provider(provider)
            .with_source(error)
    } else if error.is_connect() {
        GatewayError::unknown(format!("connection failed: {error}"))
            .for_provider(provider)
            .with_source(error)
    } else {
        GatewayError::unknown(format!("request failed: {error}"))
            .for_provider(provider)
            .with_source(error)
    }
}

/// Classify a response body that does not match the expected shape
#[must_use]
pub fn classify_decode(provider: &str, error: serde_json::Error) -> GatewayError {
    GatewayError::unknown(format!("invalid response body: {error}"))
        .for_provider(provider)
        .with_source(error)
}

fn mentions_context_length(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("context length")
        || lower.contains("context_length")
        || lower.contains("context window")
        || lower.contains("maximum context")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { message: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

fn extract_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorBody>(body).ok()? {
        ErrorBody::Nested {
            error: ErrorDetail::Object { message } | ErrorDetail::Text(message),
        }
        | ErrorBody::Flat { message } => Some(message),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
