//! # Gateway Providers
//!
//! Upstream LLM provider adapters for the LLM Request Gateway.
//!
//! This crate provides:
//! - OpenRouter (aggregator, remote per-model defaults)
//! - DeepSeek (direct, OpenAI-compatible)
//! - Anthropic (direct, Messages API)
//! - The [`ProviderRegistry`] that builds, owns and selects adapters
//!
//! Every adapter maps vendor failures onto the gateway error taxonomy via
//! [`error::classify_http`] and friends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod catalog;
pub mod deepseek;
pub mod error;
mod openai_compat;
pub mod openrouter;
pub mod parameters;
pub mod registry;
pub mod sse;

// Re-export main types
pub use anthropic::AnthropicProvider;
pub use deepseek::DeepSeekProvider;
pub use openrouter::OpenRouterProvider;
pub use parameters::{ModelParameters, ParameterCache, DEFAULT_MAX_TOKENS, FALLBACK_TTL};
pub use registry::{builtin_constructor, ProviderConstructor, ProviderEntry, ProviderRegistry, BUILTIN_PROVIDERS};
pub use sse::{SseFrame, SseLineDecoder, MAX_PENDING_BYTES};
