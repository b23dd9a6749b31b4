//! Error taxonomy for the gateway.
//!
//! Every failure that crosses a component boundary is one of seven kinds.
//! Adapters translate vendor-specific failures into these before returning,
//! and the orchestrator maps each kind onto a stable caller-facing status.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error used as the diagnostic cause of a [`GatewayError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Closed set of error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Authentication, configuration, or vendor-down failures
    ProviderError,
    /// Quota exceeded at the gateway's limiter or at the vendor
    RateLimit,
    /// Prompt plus options exceed the model window
    ContextLength,
    /// Malformed request parameters
    InvalidRequest,
    /// Network deadline exceeded
    Timeout,
    /// Unknown model identifier
    ModelNotFound,
    /// Unclassified or transient failure
    Unknown,
}

impl ErrorKind {
    /// Stable machine-readable code
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ProviderError => "PROVIDER_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::ContextLength => "CONTEXT_LENGTH",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Timeout => "TIMEOUT",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Caller-facing HTTP status
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::ProviderError => 502,
            Self::RateLimit => 429,
            Self::ContextLength => 413,
            Self::InvalidRequest => 400,
            Self::Timeout => 504,
            Self::ModelNotFound => 404,
            Self::Unknown => 500,
        }
    }

    /// Whether repeating the request can plausibly succeed.
    ///
    /// Only unclassified failures qualify; every other kind is terminal.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Authentication, configuration, or vendor-down failure
    #[error("{}{message}", provider_prefix(.provider))]
    Provider {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Quota exceeded
    #[error("{}{message}", provider_prefix(.provider))]
    RateLimit {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Requests left in the caller's current window, when known
        remaining_requests: Option<u32>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Context window exceeded
    #[error("{}{message}", provider_prefix(.provider))]
    ContextLength {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Malformed request
    #[error("{}{message}", provider_prefix(.provider))]
    InvalidRequest {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Network deadline exceeded
    #[error("{}{message}", provider_prefix(.provider))]
    Timeout {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Unknown model identifier
    #[error("{}{message}", provider_prefix(.provider))]
    ModelNotFound {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Unclassified or transient failure
    #[error("{}{message}", provider_prefix(.provider))]
    Unknown {
        /// Error message
        message: String,
        /// Originating provider
        provider: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },
}

fn provider_prefix(provider: &Option<String>) -> String {
    provider
        .as_deref()
        .map(|p| format!("[{p}] "))
        .unwrap_or_default()
}

impl GatewayError {
    /// Create an error of the given kind
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::ProviderError => Self::Provider {
                message,
                provider: None,
                source: None,
            },
            ErrorKind::RateLimit => Self::RateLimit {
                message,
                provider: None,
                remaining_requests: None,
                source: None,
            },
            ErrorKind::ContextLength => Self::ContextLength {
                message,
                provider: None,
                source: None,
            },
            ErrorKind::InvalidRequest => Self::InvalidRequest {
                message,
                provider: None,
                source: None,
            },
            ErrorKind::Timeout => Self::Timeout {
                message,
                provider: None,
                source: None,
            },
            ErrorKind::ModelNotFound => Self::ModelNotFound {
                message,
                provider: None,
                source: None,
            },
            ErrorKind::Unknown => Self::Unknown {
                message,
                provider: None,
                source: None,
            },
        }
    }

    /// Create a provider error
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderError, message)
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Create a context length error
    #[must_use]
    pub fn context_length(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContextLength, message)
    }

    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a model-not-found error
    #[must_use]
    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModelNotFound, message)
    }

    /// Create an unknown error
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Attach the originating provider
    #[must_use]
    pub fn for_provider(mut self, name: impl Into<String>) -> Self {
        *self.provider_slot() = Some(name.into());
        self
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        *self.source_slot() = Some(source.into());
        self
    }

    /// Attach the caller's remaining quota. No effect on other kinds.
    #[must_use]
    pub fn with_remaining(mut self, remaining: u32) -> Self {
        if let Self::RateLimit {
            remaining_requests, ..
        } = &mut self
        {
            *remaining_requests = Some(remaining);
        }
        self
    }

    /// The error kind
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider { .. } => ErrorKind::ProviderError,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::ContextLength { .. } => ErrorKind::ContextLength,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The human-readable message, without the provider prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::RateLimit { message, .. }
            | Self::ContextLength { message, .. }
            | Self::InvalidRequest { message, .. }
            | Self::Timeout { message, .. }
            | Self::ModelNotFound { message, .. }
            | Self::Unknown { message, .. } => message,
        }
    }

    /// The originating provider, if known
    #[must_use]
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Self::Provider { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::ContextLength { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::ModelNotFound { provider, .. }
            | Self::Unknown { provider, .. } => provider.as_deref(),
        }
    }

    /// Remaining quota carried by a rate limit error
    #[must_use]
    pub fn remaining_requests(&self) -> Option<u32> {
        match self {
            Self::RateLimit {
                remaining_requests, ..
            } => *remaining_requests,
            _ => None,
        }
    }

    /// Whether the retry policy may repeat the request
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Caller-facing HTTP status
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Build the caller-facing error body
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status_code(),
            code: self.kind(),
            message: self.message().to_string(),
            provider: self.provider_name().map(ToString::to_string),
            remaining_requests: self.remaining_requests(),
        }
    }

    fn provider_slot(&mut self) -> &mut Option<String> {
        match self {
            Self::Provider { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::ContextLength { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::ModelNotFound { provider, .. }
            | Self::Unknown { provider, .. } => provider,
        }
    }

    fn source_slot(&mut self) -> &mut Option<BoxError> {
        match self {
            Self::Provider { source, .. }
            | Self::RateLimit { source, .. }
            | Self::ContextLength { source, .. }
            | Self::InvalidRequest { source, .. }
            | Self::Timeout { source, .. }
            | Self::ModelNotFound { source, .. }
            | Self::Unknown { source, .. } => source,
        }
    }
}

/// Error body returned to callers of the inbound surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status
    pub status: u16,
    /// Stable error code
    pub code: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Originating provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Remaining quota, for rate limit errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<u32>,
}
