//! Agentic tool-calling loop.
//!
//! Drives the model ↔ tool round-trip: sends the transcript to the model,
//! executes any tool calls in the response sequentially, appends the
//! results, and repeats until the model answers without tools or the round
//! budget is spent. An exhausted budget ends with one forced completion
//! sent without tool schemas.

use tracing::{debug, info, warn};

use super::client::ChatClient;
use super::config::{DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_RESULT_PREVIEW_CHARS};
use super::executor::{ToolRegistry, parse_arguments};
use super::message::{ChatRequest, StandardMessage, tool_message};
use super::tool::ToolExecutionRecord;
use crate::error::{AgentError, truncate_chars};

/// Bounds for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    /// Tool rounds allowed before the forced final completion.
    pub max_rounds: usize,
    /// Characters of each tool result kept in the execution log.
    pub preview_chars: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            preview_chars: DEFAULT_RESULT_PREVIEW_CHARS,
        }
    }
}

/// Result of [`agentic_loop`].
#[derive(Debug, Clone, Default)]
pub struct LoopOutcome {
    /// Final model message. Never carries tool calls.
    pub message: StandardMessage,
    /// Every tool invocation, in execution order.
    pub tools_called: Vec<ToolExecutionRecord>,
    /// Tool rounds executed.
    pub rounds: usize,
    /// `true` when the answer came from the forced no-tools completion.
    pub budget_exhausted: bool,
}

/// Runs the bounded loop: model → tool calls → tool results → model → …
///
/// `request.messages` is extended in place with the assistant and tool
/// turns of every round. `request.tools` is offered on every round and
/// withheld from the forced final completion.
///
/// # Errors
///
/// Propagates provider errors unchanged; nothing is retried.
pub async fn agentic_loop(
    client: &ChatClient,
    request: &mut ChatRequest,
    registry: &ToolRegistry,
    limits: LoopLimits,
) -> Result<LoopOutcome, AgentError> {
    let mut tools_called = Vec::new();

    for round in 0..limits.max_rounds {
        let response = client.send(request).await?;

        if response.is_terminal() {
            debug!(round, "agentic loop completed with final text response");
            return Ok(LoopOutcome {
                message: response,
                tools_called,
                rounds: round,
                budget_exhausted: false,
            });
        }

        info!(
            round,
            tool_count = response.tool_calls.len(),
            "executing tool calls"
        );

        let calls = response.tool_calls.clone();
        request.messages.push(response.into_turn());

        for call in &calls {
            let arguments = parse_arguments(&call.function.arguments);
            let result = registry.execute(call.name(), &arguments);
            debug!(
                tool = call.name(),
                call_id = call.id.as_str(),
                result_len = result.len(),
                "tool execution complete"
            );
            request.messages.push(tool_message(&call.id, &result));
            tools_called.push(ToolExecutionRecord {
                tool: call.name().to_string(),
                arguments,
                result_preview: truncate_chars(&result, limits.preview_chars),
            });
        }
    }

    let final_request = ChatRequest {
        tools: Vec::new(),
        ..request.clone()
    };
    let response = client.send(&final_request).await?;
    if !response.tool_calls.is_empty() {
        warn!(
            discarded = response.tool_calls.len(),
            "forced final completion requested tools; discarding"
        );
    }
    if response.text().is_empty() {
        warn!(rounds = limits.max_rounds, "tool budget exhausted with an empty answer");
    }

    Ok(LoopOutcome {
        message: StandardMessage::assistant(response.content, Vec::new()),
        tools_called,
        rounds: limits.max_rounds,
        budget_exhausted: true,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::client::ProviderKind;
    use crate::agent::executor::{Tool, ToolArgs};
    use crate::agent::message::{Role, system_message, user_message};
    use crate::agent::provider::LlmProvider;
    use crate::agent::tool::{ToolCall, ToolDefinition};
    use crate::error::ToolError;

    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    /// Returns tool calls on the first `tool_rounds` calls, then text.
    struct MockToolProvider {
        call_count: AtomicUsize,
        tool_rounds: usize,
        calls_per_round: usize,
        tools_seen: Mutex<Vec<usize>>,
    }

    impl MockToolProvider {
        fn new(tool_rounds: usize) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                tool_rounds,
                calls_per_round: 1,
                tools_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockToolProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<StandardMessage, AgentError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.tools_seen.lock() {
                seen.push(request.tools.len());
            }

            if count < self.tool_rounds {
                let calls = (0..self.calls_per_round)
                    .map(|i| ToolCall::new(format!("call_{count}_{i}"), "echo", format!(r#"{{"n":{i}}}"#)))
                    .collect();
                Ok(StandardMessage::assistant(None, calls))
            } else {
                Ok(StandardMessage::assistant(
                    Some("Final answer based on tool results.".to_string()),
                    Vec::new(),
                ))
            }
        }
    }

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echoes arguments".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
            Ok(json!({ "echo": args, "padding": "x".repeat(1000) }))
        }
    }

    fn client_for(provider: Arc<MockToolProvider>) -> ChatClient {
        ChatClient::builder().with_provider(ProviderKind::OpenAi, provider)
    }

    fn request(registry: &ToolRegistry) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![system_message("You are a test agent."), user_message("query")],
            temperature: Some(0.0),
            max_tokens: Some(1024),
            tools: registry.definitions(),
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new().with_tool(Arc::new(EchoTool))
    }

    #[tokio::test]
    async fn test_single_tool_round() {
        let provider = Arc::new(MockToolProvider::new(1));
        let registry = registry();
        let mut req = request(&registry);

        let outcome = agentic_loop(&client_for(provider), &mut req, &registry, LoopLimits::default())
            .await
            .unwrap_or_else(|e| panic!("agentic_loop failed: {e}"));

        assert_eq!(outcome.message.text(), "Final answer based on tool results.");
        assert_eq!(outcome.rounds, 1);
        assert!(!outcome.budget_exhausted);
        assert_eq!(outcome.tools_called.len(), 1);
        // system + user + assistant(tool_calls) + tool(result)
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[3].role, Role::Tool);
        assert_eq!(req.messages[3].tool_call_id.as_deref(), Some("call_0_0"));
    }

    #[tokio::test]
    async fn test_immediate_answer_runs_no_tools() {
        let provider = Arc::new(MockToolProvider::new(0));
        let registry = registry();
        let mut req = request(&registry);

        let outcome = agentic_loop(&client_for(provider), &mut req, &registry, LoopLimits::default())
            .await
            .unwrap_or_else(|e| panic!("agentic_loop failed: {e}"));

        assert!(outcome.tools_called.is_empty());
        assert_eq!(req.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_forces_final_without_tools() {
        let provider = Arc::new(MockToolProvider::new(100));
        let registry = registry();
        let mut req = request(&registry);

        let outcome = agentic_loop(&client_for(Arc::clone(&provider)), &mut req, &registry, LoopLimits::default())
            .await
            .unwrap_or_else(|e| panic!("agentic_loop failed: {e}"));

        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.tools_called.len(), 3);
        assert!(outcome.message.tool_calls.is_empty());
        assert_eq!(outcome.message.text(), "");
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 4);
        let seen = provider.tools_seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen, vec![1, 1, 1, 0]);
    }

    #[tokio::test]
    async fn test_multiple_calls_per_round_run_in_order() {
        let provider = Arc::new(MockToolProvider {
            calls_per_round: 3,
            ..MockToolProvider::new(1)
        });
        let registry = registry();
        let mut req = request(&registry);

        let outcome = agentic_loop(&client_for(provider), &mut req, &registry, LoopLimits::default())
            .await
            .unwrap_or_else(|e| panic!("agentic_loop failed: {e}"));

        let ids: Vec<_> = req.messages[3..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["call_0_0", "call_0_1", "call_0_2"]);
        assert_eq!(outcome.tools_called.len(), 3);
    }

    #[tokio::test]
    async fn test_result_preview_is_truncated() {
        let provider = Arc::new(MockToolProvider::new(1));
        let registry = registry();
        let mut req = request(&registry);
        let limits = LoopLimits {
            preview_chars: 50,
            ..LoopLimits::default()
        };

        let outcome = agentic_loop(&client_for(provider), &mut req, &registry, limits)
            .await
            .unwrap_or_else(|e| panic!("agentic_loop failed: {e}"));

        assert_eq!(outcome.tools_called[0].result_preview.chars().count(), 50);
        assert!(req.messages[3].content.chars().count() > 1000);
    }

    #[tokio::test]
    async fn test_zero_rounds_goes_straight_to_final() {
        let provider = Arc::new(MockToolProvider::new(100));
        let registry = registry();
        let mut req = request(&registry);
        let limits = LoopLimits {
            max_rounds: 0,
            ..LoopLimits::default()
        };

        let outcome = agentic_loop(&client_for(Arc::clone(&provider)), &mut req, &registry, limits)
            .await
            .unwrap_or_else(|e| panic!("agentic_loop failed: {e}"));

        assert!(outcome.budget_exhausted);
        assert!(outcome.tools_called.is_empty());
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);
    }
}
