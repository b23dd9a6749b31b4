//! # Gateway Telemetry
//!
//! Observability for the LLM Request Gateway.
//!
//! This crate provides:
//! - Structured logging setup ([`init_logging`])
//! - The [`GatewayObserver`] event contract reported by the orchestrator
//! - A tracing-backed observer and Prometheus metrics in a private registry

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod logging;
pub mod metrics;

// Re-export main types
pub use events::{CompositeObserver, DispatchOutcome, GatewayObserver, LogObserver, NoopObserver};
pub use logging::{init_logging, LoggingConfig};
pub use metrics::GatewayMetrics;

/// Telemetry errors
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The log filter directive does not parse
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber could not be installed
    #[error("failed to initialize logging: {0}")]
    Init(String),

    /// A metric could not be created or registered
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Rendered metrics are not valid text
    #[error("metrics encoding error: {0}")]
    Encoding(String),
}
