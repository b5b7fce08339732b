//! Grounded tool-calling agent.
//!
//! Combines retrieved case-study context with on-demand analysis tool
//! calls behind a provider-agnostic chat abstraction.
//!
//! # Architecture
//!
//! ```text
//! User question → Orchestrator
//!   ├── Retriever (context + citations, degrades to a fixed note)
//!   ├── augmented user turn (system + history + context/question)
//!   └── agentic loop (≤ max_tool_rounds)
//!       ├── ChatClient → model catalog → OpenAI | Gemini | Anthropic adapter
//!       ├── ToolRegistry::execute for each tool call, in order
//!       └── forced no-tools completion when the budget is spent
//! ```

pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod executor;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod tool;

// Re-export key types
pub use agentic_loop::{LoopLimits, LoopOutcome, agentic_loop};
pub use client::{ChatClient, ModelInfo, ProviderKind, create_client, models, provider_for_model};
pub use config::AgentConfig;
pub use executor::{Tool, ToolArgs, ToolRegistry, parse_arguments};
pub use message::{ChatMessage, ChatRequest, Role, StandardMessage};
pub use orchestrator::{AgentReply, Orchestrator};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use tool::{ToolCall, ToolDefinition, ToolExecutionRecord, ToolSchema};
