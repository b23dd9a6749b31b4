//! Provider adapter contract.
//!
//! Every upstream vendor is wrapped in an adapter implementing
//! [`LLMProvider`]. Adapters translate the uniform request model to the
//! vendor's wire format and map every vendor failure onto the gateway error
//! taxonomy before returning.

use crate::error::GatewayResult;
use crate::request::{ChatMessage, RequestOptions};
use crate::response::{CompletionResult, ModelCapabilities};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy, finite, non-restartable sequence of partial completions.
///
/// Pull-based: the adapter reads from the network only when the consumer
/// polls. Dropping the stream closes the upstream response.
pub type CompletionStream = BoxStream<'static, GatewayResult<CompletionResult>>;

/// Capability contract implemented identically by every vendor adapter
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name, unique within a registry
    fn name(&self) -> &str;

    /// Model used when the caller does not name one
    fn default_model(&self) -> &str;

    /// Static capabilities of a model, when catalogued
    fn capabilities(&self, model: &str) -> Option<ModelCapabilities>;

    /// Lightweight connectivity check performed once at registration.
    ///
    /// # Errors
    /// Returns `ProviderError` if the vendor is unreachable or rejects the
    /// credentials
    async fn initialize(&self) -> GatewayResult<()>;

    /// Liveness probe. Never fails; any failure reads as unhealthy.
    async fn health_check(&self) -> bool;

    /// Fill every unset option from the defaults of the target model.
    ///
    /// The result always names a model. Resolving already-resolved options
    /// returns them unchanged.
    async fn resolve_options(&self, options: &RequestOptions) -> RequestOptions;

    /// One blocking round trip
    ///
    /// # Errors
    /// Returns a classified error on any upstream failure
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionResult>;

    /// Open a streamed completion
    ///
    /// # Errors
    /// Returns a classified error if the stream cannot be opened
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> GatewayResult<CompletionStream>;

    /// Models the vendor reports as available
    ///
    /// # Errors
    /// Returns a classified error if the listing fails
    async fn list_models(&self) -> GatewayResult<Vec<String>>;
}
