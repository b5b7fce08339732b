//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Default output token limit per completion.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default number of tool-calling rounds before the forced final answer.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 3;
/// Default number of retrieved chunks.
pub const DEFAULT_TOP_K: usize = 4;
/// Characters of each tool result kept in the execution log.
pub const DEFAULT_RESULT_PREVIEW_CHARS: usize = 500;
/// Characters of a tool failure message passed back to the model.
pub const DEFAULT_TOOL_ERROR_CHARS: usize = 200;
/// Characters of a backend error shown to end users.
pub const DEFAULT_USER_ERROR_CHARS: usize = 300;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the agent system.
#[derive(Clone)]
pub struct AgentConfig {
    /// `OpenAI` API key.
    pub openai_api_key: Option<String>,
    /// Google Generative Language API key.
    pub google_api_key: Option<String>,
    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,
    /// Base URL override for the `OpenAI`-compatible endpoint.
    pub openai_base_url: Option<String>,
    /// Base URL override for the Gemini endpoint.
    pub gemini_base_url: Option<String>,
    /// Base URL override for the Anthropic endpoint.
    pub anthropic_base_url: Option<String>,
    /// Provider override; when set, the model catalog lookup is skipped.
    pub provider: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token limit per completion.
    pub max_tokens: u32,
    /// Tool-calling rounds before the forced final completion.
    pub max_tool_rounds: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Characters of each tool result kept in [`ToolExecutionRecord`](super::tool::ToolExecutionRecord).
    pub result_preview_chars: usize,
    /// Characters of tool failure messages.
    pub tool_error_chars: usize,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// `system.md` and `rag_context.md` found here replace the compiled-in
    /// prompts; missing files fall back to the defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("openai_api_key", &redact(self.openai_api_key.as_ref()))
            .field("google_api_key", &redact(self.google_api_key.as_ref()))
            .field("anthropic_api_key", &redact(self.anthropic_api_key.as_ref()))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("top_k", &self.top_k)
            .field("timeout", &self.timeout)
            .field("prompt_dir", &self.prompt_dir)
            .finish_non_exhaustive()
    }
}

fn redact(key: Option<&String>) -> Option<&'static str> {
    key.map(|_| "<redacted>")
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Clone, Default)]
pub struct AgentConfigBuilder {
    openai_api_key: Option<String>,
    google_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    openai_base_url: Option<String>,
    gemini_base_url: Option<String>,
    anthropic_base_url: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_tool_rounds: Option<usize>,
    top_k: Option<usize>,
    result_preview_chars: Option<usize>,
    tool_error_chars: Option<usize>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AgentConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfigBuilder")
            .field("openai_api_key", &redact(self.openai_api_key.as_ref()))
            .field("google_api_key", &redact(self.google_api_key.as_ref()))
            .field("anthropic_api_key", &redact(self.anthropic_api_key.as_ref()))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("top_k", &self.top_k)
            .field("prompt_dir", &self.prompt_dir)
            .finish_non_exhaustive()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_non_empty(name).and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.openai_api_key.is_none() {
            self.openai_api_key = env_non_empty("OPENAI_API_KEY");
        }
        if self.google_api_key.is_none() {
            self.google_api_key = env_non_empty("GOOGLE_API_KEY");
        }
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = env_non_empty("ANTHROPIC_API_KEY");
        }
        if self.openai_base_url.is_none() {
            self.openai_base_url = env_non_empty("OPENAI_BASE_URL");
        }
        if self.gemini_base_url.is_none() {
            self.gemini_base_url = env_non_empty("GEMINI_BASE_URL");
        }
        if self.anthropic_base_url.is_none() {
            self.anthropic_base_url = env_non_empty("ANTHROPIC_BASE_URL");
        }
        if self.model.is_none() {
            self.model = env_non_empty("NEXUS_MODEL");
        }
        if self.temperature.is_none() {
            self.temperature = env_parsed("NEXUS_TEMPERATURE");
        }
        if self.max_tool_rounds.is_none() {
            self.max_tool_rounds = env_parsed("NEXUS_MAX_TOOL_ROUNDS");
        }
        if self.top_k.is_none() {
            self.top_k = env_parsed("NEXUS_TOP_K");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env_non_empty("NEXUS_PROMPT_DIR").map(PathBuf::from);
        }
        self
    }

    /// Sets the `OpenAI` API key.
    #[must_use]
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Sets the Google API key.
    #[must_use]
    pub fn google_api_key(mut self, key: impl Into<String>) -> Self {
        self.google_api_key = Some(key.into());
        self
    }

    /// Sets the Anthropic API key.
    #[must_use]
    pub fn anthropic_api_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(key.into());
        self
    }

    /// Sets the `OpenAI` base URL override.
    #[must_use]
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    /// Sets the Gemini base URL override.
    #[must_use]
    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.gemini_base_url = Some(url.into());
        self
    }

    /// Sets the Anthropic base URL override.
    #[must_use]
    pub fn anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.anthropic_base_url = Some(url.into());
        self
    }

    /// Forces a provider instead of the model catalog lookup.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the output token limit.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the tool-calling round budget.
    #[must_use]
    pub const fn max_tool_rounds(mut self, n: usize) -> Self {
        self.max_tool_rounds = Some(n);
        self
    }

    /// Sets the retrieval top-k.
    #[must_use]
    pub const fn top_k(mut self, n: usize) -> Self {
        self.top_k = Some(n);
        self
    }

    /// Sets the result preview length.
    #[must_use]
    pub const fn result_preview_chars(mut self, n: usize) -> Self {
        self.result_preview_chars = Some(n);
        self
    }

    /// Sets the tool error truncation length.
    #[must_use]
    pub const fn tool_error_chars(mut self, n: usize) -> Self {
        self.tool_error_chars = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no provider has an API key.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        if self.openai_api_key.is_none()
            && self.google_api_key.is_none()
            && self.anthropic_api_key.is_none()
        {
            return Err(AgentError::ApiKeyMissing);
        }

        Ok(AgentConfig {
            openai_api_key: self.openai_api_key,
            google_api_key: self.google_api_key,
            anthropic_api_key: self.anthropic_api_key,
            openai_base_url: self.openai_base_url,
            gemini_base_url: self.gemini_base_url,
            anthropic_base_url: self.anthropic_base_url,
            provider: self.provider,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            max_tool_rounds: self.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
            result_preview_chars: self
                .result_preview_chars
                .unwrap_or(DEFAULT_RESULT_PREVIEW_CHARS),
            tool_error_chars: self.tool_error_chars.unwrap_or(DEFAULT_TOOL_ERROR_CHARS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
        })
    }
}
