//! # Gateway Core
//!
//! Core types, traits, and error handling for the LLM Request Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Request and response types
//! - The provider adapter trait
//! - The closed error taxonomy
//! - Streamed response events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;

// Re-export commonly used types
pub use error::{BoxError, ErrorKind, ErrorResponse, GatewayError, GatewayResult};
pub use provider::{CompletionStream, LLMProvider};
pub use request::{validate_messages, ChatMessage, MessageRole, RequestOptions};
pub use response::{CompletionMetadata, CompletionResult, ModelCapabilities, ModelPricing, Usage};
pub use streaming::{StreamChunk, StreamEvent, StreamSummary};
