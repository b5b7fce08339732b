//! Pluggable LLM provider trait.
//!
//! Implementations translate the provider-agnostic [`ChatRequest`] into a
//! backend's native request and the backend's native response back into a
//! [`StandardMessage`]. No agent logic depends on any particular vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, StandardMessage};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations own their wire translation and transport. They do not
/// retry: a failed call surfaces as [`AgentError`] to the caller.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"anthropic"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn complete(&self, request: &ChatRequest) -> Result<StandardMessage, AgentError>;
}
