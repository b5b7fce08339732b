//! Model catalog and provider routing.
//!
//! [`ChatClient::complete`] is the single entry point for model calls: it
//! looks up which provider serves a model and dispatches to that
//! provider's adapter. Unknown model IDs route to `OpenAI`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::config::{AgentConfig, DEFAULT_MAX_TOKENS};
use super::message::{ChatMessage, ChatRequest, StandardMessage};
use super::provider::LlmProvider;
use super::providers::{AnthropicProvider, GeminiProvider, OpenAiProvider};
use super::tool::ToolDefinition;
use crate::error::AgentError;

/// Backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `OpenAI` chat completions.
    OpenAi,
    /// Google Gemini.
    Google,
    /// Anthropic Messages.
    Anthropic,
}

impl ProviderKind {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "google" | "gemini" => Ok(Self::Google),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(AgentError::UnsupportedProvider {
                name: other.to_string(),
            }),
        }
    }
}

/// One selectable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Display label.
    pub label: &'static str,
    /// API model identifier.
    pub id: &'static str,
    /// Serving provider.
    pub provider: ProviderKind,
}

const DEFAULT_MODELS: [ModelInfo; 6] = [
    ModelInfo {
        label: "GPT-4o-mini",
        id: "gpt-4o-mini",
        provider: ProviderKind::OpenAi,
    },
    ModelInfo {
        label: "GPT-4o",
        id: "gpt-4o",
        provider: ProviderKind::OpenAi,
    },
    ModelInfo {
        label: "GPT-4.1-mini",
        id: "gpt-4.1-mini",
        provider: ProviderKind::OpenAi,
    },
    ModelInfo {
        label: "GPT-4.1",
        id: "gpt-4.1",
        provider: ProviderKind::OpenAi,
    },
    ModelInfo {
        label: "Gemini 2.0 Flash",
        id: "gemini-2.0-flash",
        provider: ProviderKind::Google,
    },
    ModelInfo {
        label: "Claude 3.5 Haiku",
        id: "claude-3-5-haiku-latest",
        provider: ProviderKind::Anthropic,
    },
];

/// Returns the built-in model table.
#[must_use]
pub const fn models() -> &'static [ModelInfo] {
    &DEFAULT_MODELS
}

/// Provider serving `model`; `OpenAI` for anything not in the catalog.
#[must_use]
pub fn provider_for_model(model: &str) -> ProviderKind {
    models()
        .iter()
        .find(|m| m.id == model)
        .map_or(ProviderKind::OpenAi, |m| m.provider)
}

/// Routes completions to the provider adapter serving each model.
#[derive(Clone, Default)]
pub struct ChatClient {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    provider_override: Option<ProviderKind>,
    max_tokens: Option<u32>,
}

impl ChatClient {
    /// Creates a client with no providers registered.
    #[must_use]
    pub fn builder() -> Self {
        Self::default()
    }

    /// Registers the adapter for `kind`.
    #[must_use]
    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Routes every model to `kind`, bypassing the catalog.
    #[must_use]
    pub const fn with_provider_override(mut self, kind: ProviderKind) -> Self {
        self.provider_override = Some(kind);
        self
    }

    /// Sets the output token limit sent with each request.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Provider that would serve `model`.
    #[must_use]
    pub fn route(&self, model: &str) -> ProviderKind {
        self.provider_override
            .unwrap_or_else(|| provider_for_model(model))
    }

    /// Providers with a registered adapter.
    #[must_use]
    pub fn available(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Runs one completion against the provider serving `model`.
    ///
    /// `tools` may be empty, in which case no tool schemas are sent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ProviderUnavailable`] when no adapter is
    /// registered for the routed provider, or the adapter's error.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
        temperature: f32,
    ) -> Result<StandardMessage, AgentError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: Some(temperature),
            max_tokens: Some(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            tools: tools.to_vec(),
        };
        self.send(&request).await
    }

    /// Sends a fully built request to the provider serving `request.model`.
    ///
    /// # Errors
    ///
    /// See [`ChatClient::complete`].
    pub async fn send(&self, request: &ChatRequest) -> Result<StandardMessage, AgentError> {
        let kind = self.route(&request.model);
        let provider = self
            .providers
            .get(&kind)
            .ok_or_else(|| AgentError::ProviderUnavailable {
                provider: kind.to_string(),
                model: request.model.clone(),
            })?;
        debug!(provider = provider.name(), model = request.model.as_str(), "dispatching completion");
        provider.complete(request).await
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("providers", &self.available())
            .field("provider_override", &self.provider_override)
            .finish_non_exhaustive()
    }
}

/// Builds a [`ChatClient`] with an adapter for every provider that has a key.
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for an unknown provider
/// override, or [`AgentError::ApiRequest`] if an HTTP client cannot be built.
pub fn create_client(config: &AgentConfig) -> Result<ChatClient, AgentError> {
    let mut client = ChatClient::builder().with_max_tokens(config.max_tokens);

    if let Some(name) = config.provider.as_deref() {
        client = client.with_provider_override(name.parse()?);
    }
    if let Some(key) = config.openai_api_key.as_deref() {
        let provider = OpenAiProvider::new(key, config.openai_base_url.as_deref(), config.timeout)?;
        client = client.with_provider(ProviderKind::OpenAi, Arc::new(provider));
    }
    if let Some(key) = config.google_api_key.as_deref() {
        let provider = GeminiProvider::new(key, config.gemini_base_url.as_deref(), config.timeout)?;
        client = client.with_provider(ProviderKind::Google, Arc::new(provider));
    }
    if let Some(key) = config.anthropic_api_key.as_deref() {
        let provider =
            AnthropicProvider::new(key, config.anthropic_base_url.as_deref(), config.timeout)?;
        client = client.with_provider(ProviderKind::Anthropic, Arc::new(provider));
    }

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::user_message;
    use async_trait::async_trait;
    use test_case::test_case;

    struct NamedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for NamedProvider {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn complete(&self, request: &ChatRequest) -> Result<StandardMessage, AgentError> {
            Ok(StandardMessage::assistant(
                Some(format!("{}:{}:{}", self.0, request.model, request.max_tokens.unwrap_or(0))),
                Vec::new(),
            ))
        }
    }

    fn full_client() -> ChatClient {
        ChatClient::builder()
            .with_provider(ProviderKind::OpenAi, Arc::new(NamedProvider("openai")))
            .with_provider(ProviderKind::Google, Arc::new(NamedProvider("gemini")))
            .with_provider(ProviderKind::Anthropic, Arc::new(NamedProvider("anthropic")))
    }

    #[test_case("gpt-4o-mini", ProviderKind::OpenAi ; "gpt-4o-mini")]
    #[test_case("gpt-4.1", ProviderKind::OpenAi ; "gpt-4.1")]
    #[test_case("gemini-2.0-flash", ProviderKind::Google ; "gemini")]
    #[test_case("claude-3-5-haiku-latest", ProviderKind::Anthropic ; "claude")]
    #[test_case("some-future-model", ProviderKind::OpenAi ; "unknown falls back")]
    fn test_provider_for_model(model: &str, expected: ProviderKind) {
        assert_eq!(provider_for_model(model), expected);
    }

    #[test_case("openai", ProviderKind::OpenAi ; "openai")]
    #[test_case("Gemini", ProviderKind::Google ; "gemini alias")]
    #[test_case("google", ProviderKind::Google ; "google")]
    #[test_case("anthropic", ProviderKind::Anthropic ; "anthropic")]
    fn test_provider_kind_parse(name: &str, expected: ProviderKind) {
        assert_eq!(name.parse::<ProviderKind>().ok(), Some(expected));
    }

    #[test]
    fn test_provider_kind_parse_unknown() {
        assert!(matches!(
            "mistral".parse::<ProviderKind>(),
            Err(AgentError::UnsupportedProvider { .. })
        ));
    }

    #[tokio::test]
    async fn test_complete_dispatches_by_model() {
        let client = full_client().with_max_tokens(77);
        let msg = client
            .complete(&[user_message("hi")], &[], "claude-3-5-haiku-latest", 0.3)
            .await
            .unwrap_or_default();
        assert_eq!(msg.content.as_deref(), Some("anthropic:claude-3-5-haiku-latest:77"));
    }

    #[tokio::test]
    async fn test_override_bypasses_catalog() {
        let client = full_client().with_provider_override(ProviderKind::Google);
        let msg = client
            .complete(&[user_message("hi")], &[], "gpt-4o", 0.3)
            .await
            .unwrap_or_default();
        assert_eq!(msg.content.as_deref(), Some("gemini:gpt-4o:1024"));
    }

    #[tokio::test]
    async fn test_missing_provider_is_error() {
        let client = ChatClient::builder()
            .with_provider(ProviderKind::OpenAi, Arc::new(NamedProvider("openai")));
        let result = client
            .complete(&[user_message("hi")], &[], "gemini-2.0-flash", 0.3)
            .await;
        assert!(matches!(
            result,
            Err(AgentError::ProviderUnavailable { ref provider, .. }) if provider == "google"
        ));
    }

    #[test]
    fn test_create_client_registers_keyed_providers() {
        let config = AgentConfig::builder()
            .openai_api_key("sk-test")
            .anthropic_api_key("ak-test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let client = create_client(&config).unwrap_or_default();
        assert_eq!(client.available(), vec![ProviderKind::Anthropic, ProviderKind::OpenAi]);
    }

    #[test]
    fn test_create_client_rejects_unknown_override() {
        let config = AgentConfig::builder()
            .openai_api_key("sk-test")
            .provider("mistral")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(create_client(&config).is_err());
    }

    #[test]
    fn test_catalog_ids_unique() {
        let mut ids: Vec<&str> = models().iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), models().len());
    }
}
