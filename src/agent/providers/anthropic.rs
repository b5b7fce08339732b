//! Anthropic Messages API provider.
//!
//! System text travels in the top-level `system` field. Tool calls are
//! `tool_use` content blocks carrying the original call IDs; tool results
//! are `tool_result` blocks on a user turn, since there is no tool role.
//! The API rejects consecutive turns with the same role, so translated
//! turns pass through [`merge_adjacent`] before dispatch.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::http::HttpClientBase;
use super::merge_adjacent;
use crate::agent::config::DEFAULT_MAX_TOKENS;
use crate::agent::executor::parse_arguments;
use crate::agent::message::{ChatRequest, Role, StandardMessage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// Default Anthropic API endpoint.
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Pinned API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

fn convert_tool(def: &ToolDefinition) -> AnthropicTool {
    let input_schema = if def.parameters.is_object() {
        def.parameters.clone()
    } else {
        json!({"type": "object", "properties": {}})
    };
    AnthropicTool {
        name: def.name.clone(),
        description: def.description.clone(),
        input_schema,
    }
}

fn text_blocks(text: &str) -> Vec<ContentBlock> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::Text {
            text: text.to_string(),
        }]
    }
}

fn tool_use(call: &ToolCall) -> ContentBlock {
    ContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name().to_string(),
        input: Value::Object(parse_arguments(&call.function.arguments)),
    }
}

/// Translates a generic request into a Messages API body.
pub(crate) fn build_request(request: &ChatRequest) -> AnthropicRequest {
    let mut system: Vec<&str> = Vec::new();
    let mut turns: Vec<AnthropicMessage> = Vec::with_capacity(request.messages.len());

    for msg in &request.messages {
        match msg.role {
            Role::System => system.push(&msg.content),
            Role::Tool => turns.push(AnthropicMessage {
                role: "user",
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.content.clone(),
                }],
            }),
            Role::Assistant => {
                let mut content = text_blocks(&msg.content);
                content.extend(msg.tool_calls.iter().map(tool_use));
                turns.push(AnthropicMessage {
                    role: "assistant",
                    content,
                });
            }
            Role::User => turns.push(AnthropicMessage {
                role: "user",
                content: text_blocks(&msg.content),
            }),
        }
    }

    let messages = merge_adjacent(turns, |t| t.role, |a, b| a.content.extend(b.content))
        .into_iter()
        .filter(|t| !t.content.is_empty())
        .collect();
    // Dropping an empty turn can leave two same-role neighbours.
    let messages = merge_adjacent(messages, |t| t.role, |a, b| a.content.extend(b.content));

    let system = system
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    AnthropicRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
        system: (!system.is_empty()).then_some(system),
        messages,
        tools: request.tools.iter().map(convert_tool).collect(),
    }
}

/// Normalises a Messages API response.
///
/// Text blocks are joined with `\n`; `tool_use` blocks keep their IDs.
pub(crate) fn parse_response(response: AnthropicResponse) -> Result<StandardMessage, AgentError> {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input).map_err(|e| AgentError::ResponseParse {
                    provider: "anthropic".to_string(),
                    message: e.to_string(),
                })?;
                tool_calls.push(ToolCall::new(id, name, arguments));
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unsupported => {}
        }
    }

    let content = (!texts.is_empty()).then(|| texts.join("\n"));
    Ok(StandardMessage::assistant(content, tool_calls))
}

/// Anthropic Messages API provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base: HttpClientBase,
}

impl AnthropicProvider {
    /// Creates a provider for `endpoint` (defaults to [`DEFAULT_ANTHROPIC_BASE_URL`]).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, endpoint: Option<&str>, timeout: Duration) -> Result<Self, AgentError> {
        Ok(Self {
            base: HttpClientBase::new(
                "anthropic",
                endpoint.unwrap_or(DEFAULT_ANTHROPIC_BASE_URL),
                api_key,
                timeout,
            )?,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<StandardMessage, AgentError> {
        let url = self.base.build_url("v1/messages");
        let body = build_request(request);

        info!(
            provider = self.base.provider,
            model = request.model.as_str(),
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending request to Anthropic"
        );

        let response: AnthropicResponse = self
            .base
            .post_with_key_header(
                &url,
                "x-api-key",
                &[("anthropic-version", ANTHROPIC_VERSION)],
                &body,
            )
            .await?;
        let message = parse_response(response)?;
        debug!(tool_calls = message.tool_calls.len(), "received Anthropic response");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{
        ChatMessage, assistant_message, system_message, tool_message, user_message,
    };

    fn request(messages: Vec<ChatMessage>, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            model: "claude-3-5-haiku-latest".to_string(),
            messages,
            temperature: Some(0.3),
            max_tokens: None,
            tools,
        }
    }

    fn body(req: &ChatRequest) -> Value {
        serde_json::to_value(build_request(req)).unwrap_or_default()
    }

    fn response(value: Value) -> StandardMessage {
        let parsed: AnthropicResponse = serde_json::from_value(value).unwrap_or_else(|_| unreachable!());
        parse_response(parsed).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_system_goes_to_system_field() {
        let b = body(&request(vec![system_message("Be grounded."), user_message("Q")], Vec::new()));
        assert_eq!(b["system"], "Be grounded.");
        assert_eq!(b["max_tokens"], 1024);
        assert_eq!(b["messages"][0], json!({"role": "user", "content": [{"type": "text", "text": "Q"}]}));
        assert!(b.get("tools").is_none());
    }

    #[test]
    fn test_tool_exchange_preserves_ids_and_alternation() {
        let mut call_turn = assistant_message("Checking prices.");
        call_turn.tool_calls = vec![
            ToolCall::new("toolu_1", "price_tool", r#"{"tickers":["NVDA"]}"#),
            ToolCall::new("toolu_2", "event_study_tool", "{invalid json"),
        ];
        let req = request(
            vec![
                system_message("sys"),
                user_message("Q"),
                call_turn,
                tool_message("toolu_1", "{\"ok\":1}"),
                tool_message("toolu_2", "{\"ok\":2}"),
            ],
            Vec::new(),
        );
        let b = body(&req);
        let messages = b["messages"].as_array().cloned().unwrap_or_default();
        assert_eq!(messages.len(), 3);
        let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);

        let assistant = &messages[1]["content"];
        assert_eq!(assistant[0], json!({"type": "text", "text": "Checking prices."}));
        assert_eq!(assistant[1]["type"], "tool_use");
        assert_eq!(assistant[1]["id"], "toolu_1");
        assert_eq!(assistant[1]["input"]["tickers"][0], "NVDA");
        assert_eq!(assistant[2]["input"], json!({}));

        let results = &messages[2]["content"];
        assert_eq!(results[0], json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "{\"ok\":1}"}));
        assert_eq!(results[1]["tool_use_id"], "toolu_2");
    }

    #[test]
    fn test_consecutive_user_turns_merged() {
        let b = body(&request(vec![user_message("a"), user_message("b"), assistant_message("c")], Vec::new()));
        assert_eq!(b["messages"][0]["content"].as_array().map_or(0, Vec::len), 2);
        assert_eq!(b["messages"].as_array().map_or(0, Vec::len), 2);
    }

    #[test]
    fn test_empty_turns_dropped_without_breaking_alternation() {
        let b = body(&request(
            vec![user_message("a"), assistant_message(""), user_message("b")],
            Vec::new(),
        ));
        assert_eq!(b["messages"].as_array().map_or(0, Vec::len), 1);
        assert_eq!(b["messages"][0]["content"][1]["text"], "b");
    }

    #[test]
    fn test_tool_schema_conversion() {
        let tools = vec![
            ToolDefinition {
                name: "price_tool".to_string(),
                description: "Prices".to_string(),
                parameters: json!({"type": "object", "properties": {"tickers": {"type": "array"}}}),
            },
            ToolDefinition {
                name: "bare".to_string(),
                description: String::new(),
                parameters: Value::Null,
            },
        ];
        let b = body(&request(vec![user_message("q")], tools));
        assert_eq!(b["tools"][0]["input_schema"]["properties"]["tickers"]["type"], "array");
        assert_eq!(b["tools"][1]["input_schema"], json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_parse_mixed_blocks() {
        let msg = response(json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_9", "name": "volatility_tool", "input": {"ticker": "AMD"}},
                {"type": "thinking", "thinking": "..."}
            ],
            "stop_reason": "tool_use"
        }));
        assert_eq!(msg.content.as_deref(), Some("Let me check."));
        assert!(!msg.is_terminal());
        assert_eq!(msg.tool_calls[0].id, "toolu_9");
        assert_eq!(msg.tool_calls[0].function.arguments, r#"{"ticker":"AMD"}"#);
    }

    #[test]
    fn test_plain_text_round_trip_preserves_content() {
        let original = StandardMessage::assistant(Some("Answer with\nnewline".to_string()), Vec::new());
        let req = request(vec![user_message("q"), original.clone().into_turn()], Vec::new());
        let sent = body(&req);
        let echoed = response(json!({ "content": sent["messages"][1]["content"] }));
        assert_eq!(echoed, original);
    }
}
