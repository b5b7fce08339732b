//! Orchestrator for grounded question answering.
//!
//! Coordinates one exchange: retrieve context → build the augmented user
//! turn → run the bounded tool loop → assemble the reply with citations
//! and the tool execution log.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use super::agentic_loop::{LoopLimits, agentic_loop};
use super::client::ChatClient;
use super::config::AgentConfig;
use super::executor::ToolRegistry;
use super::message::{ChatMessage, ChatRequest, system_message, user_message};
use super::prompt::PromptSet;
use super::tool::ToolExecutionRecord;
use crate::error::AgentError;
use crate::retrieval::{KNOWLEDGE_UNAVAILABLE, RetrievalFilters, Retriever, citations, format_for_prompt};

/// Longest accepted question, in bytes.
const MAX_QUESTION_LEN: usize = 10_000;

/// Result of one exchange.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentReply {
    /// Final answer text. May be empty when the tool budget ran out.
    pub response: String,
    /// Chunk IDs of the retrieved context, in retrieval order.
    pub citations: Vec<String>,
    /// Tool invocations, in execution order.
    pub tools_called: Vec<ToolExecutionRecord>,
}

/// Runs retrieval-augmented, tool-calling exchanges against one model.
///
/// Holds no per-exchange state; concurrent calls to [`Orchestrator::run_agent`]
/// share only the read-mostly index behind the retriever.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: ChatClient,
    retriever: Option<Retriever>,
    registry: ToolRegistry,
    prompts: PromptSet,
    model: String,
    temperature: f32,
    max_tokens: u32,
    limits: LoopLimits,
}

impl Orchestrator {
    /// Creates an orchestrator from `config`.
    ///
    /// Prompt templates are loaded from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults. `retriever` may be `None` when no index
    /// exists; the model is then told to answer from tools only.
    #[must_use]
    pub fn new(
        client: ChatClient,
        retriever: Option<Retriever>,
        registry: ToolRegistry,
        config: &AgentConfig,
    ) -> Self {
        Self {
            client,
            retriever: retriever.map(|r| r.with_top_k(config.top_k)),
            registry: registry.with_error_chars(config.tool_error_chars),
            prompts: PromptSet::load(config.prompt_dir.as_deref()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            limits: LoopLimits {
                max_rounds: config.max_tool_rounds,
                preview_chars: config.result_preview_chars,
            },
        }
    }

    /// Replaces the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Overrides the model for subsequent exchanges.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the tool round budget.
    #[must_use]
    pub const fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.limits.max_rounds = max_rounds;
        self
    }

    /// Model used for completions.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answers `user_message` given prior `history` turns.
    ///
    /// Retrieval failures never abort the exchange: they are logged and the
    /// model receives a fixed note instead of context, with no citations.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for an empty or oversized
    /// question, and propagates model backend failures unchanged.
    pub async fn run_agent(
        &self,
        user_message_text: &str,
        history: &[ChatMessage],
    ) -> Result<AgentReply, AgentError> {
        if user_message_text.trim().is_empty() {
            return Err(AgentError::Orchestration {
                message: "Question cannot be empty".to_string(),
            });
        }
        if user_message_text.len() > MAX_QUESTION_LEN {
            return Err(AgentError::Orchestration {
                message: format!(
                    "Question exceeds maximum length ({} bytes, max {MAX_QUESTION_LEN})",
                    user_message_text.len()
                ),
            });
        }

        let start = Instant::now();
        let (context, cited) = self.retrieve_context(user_message_text).await;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system_message(&self.prompts.system));
        messages.extend_from_slice(history);
        messages.push(user_message(&self.prompts.augment(&context, user_message_text)));

        let mut request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            tools: self.registry.definitions(),
        };

        let outcome = agentic_loop(&self.client, &mut request, &self.registry, self.limits).await?;

        info!(
            model = self.model.as_str(),
            rounds = outcome.rounds,
            tools = outcome.tools_called.len(),
            citations = cited.len(),
            budget_exhausted = outcome.budget_exhausted,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "exchange complete"
        );

        Ok(AgentReply {
            response: outcome.message.content.unwrap_or_default(),
            citations: cited,
            tools_called: outcome.tools_called,
        })
    }

    /// Query embedding is CPU-bound, so it runs on the blocking pool.
    async fn retrieve_context(&self, question: &str) -> (String, Vec<String>) {
        let Some(retriever) = self.retriever.clone() else {
            return (KNOWLEDGE_UNAVAILABLE.to_string(), Vec::new());
        };
        let question = question.to_string();
        let result =
            tokio::task::spawn_blocking(move || retriever.retrieve(&question, &RetrievalFilters::default()))
                .await;
        match result {
            Ok(Ok(hits)) => (format_for_prompt(&hits), citations(&hits)),
            Ok(Err(e)) => {
                warn!(error = %e, "retrieval failed, continuing without context");
                (KNOWLEDGE_UNAVAILABLE.to_string(), Vec::new())
            }
            Err(e) => {
                warn!(error = %e, "retrieval task aborted, continuing without context");
                (KNOWLEDGE_UNAVAILABLE.to_string(), Vec::new())
            }
        }
    }
}
