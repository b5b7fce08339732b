//! Provider-agnostic message types for LLM communication.
//!
//! These types decouple agent logic from any specific LLM SDK, so the
//! same transcript can be sent to `OpenAI`, Gemini or Anthropic.

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolDefinition};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    #[default]
    Assistant,
    /// Tool result.
    Tool,
}

/// A single transcript turn.
///
/// A `tool` turn's `tool_call_id` must match a call emitted by the
/// immediately preceding assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content. May be empty on assistant turns that only carry tool calls.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Tool calls requested by the assistant (only for `Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool call ID this message responds to (only for `Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A chat completion request (provider-agnostic).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Tool definitions available to the model. Empty means no tools.
    pub tools: Vec<ToolDefinition>,
}

/// One model response in provider-neutral form.
///
/// `content` joins every text fragment of the response in order, or is
/// `None` when there were none. `tool_calls` preserves the order in which
/// the backend emitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardMessage {
    /// Joined text content.
    pub content: Option<String>,
    /// Always [`Role::Assistant`] for model output.
    pub role: Role,
    /// Requested tool invocations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl StandardMessage {
    /// Builds an assistant response.
    #[must_use]
    pub const fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            role: Role::Assistant,
            tool_calls,
        }
    }

    /// A response with no tool calls ends the exchange. Any tool call makes
    /// it non-terminal, whatever text accompanies it.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.tool_calls.is_empty()
    }

    /// Text content, or the empty string.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Converts the response into the assistant turn appended to the transcript.
    #[must_use]
    pub fn into_turn(self) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: self.content.unwrap_or_default(),
            tool_calls: self.tool_calls,
            tool_call_id: None,
        }
    }
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates a user message.
#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates a plain assistant message.
#[must_use]
pub fn assistant_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates an assistant message with tool calls (no text content).
#[must_use]
pub const fn assistant_tool_calls_message(tool_calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: String::new(),
        tool_calls,
        tool_call_id: None,
    }
}

/// Creates a tool result message.
#[must_use]
pub fn tool_message(tool_call_id: &str, content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Tool,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: Some(tool_call_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_message() {
        let msg = tool_message("call_123", "result data");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.content, "result data");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    }

    #[test]
    fn test_assistant_tool_calls_message() {
        let msg = assistant_tool_calls_message(vec![ToolCall::new("call_1", "price_tool", "{}")]);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_empty());
        assert_eq!(msg.tool_calls[0].name(), "price_tool");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::System).unwrap_or_default();
        assert_eq!(json, "\"system\"");
        let json = serde_json::to_string(&Role::Tool).unwrap_or_default();
        assert_eq!(json, "\"tool\"");
    }

    #[test]
    fn test_chat_message_serialization_omits_empty_fields() {
        let json = serde_json::to_string(&assistant_tool_calls_message(Vec::new())).unwrap_or_default();
        assert_eq!(json, r#"{"role":"assistant"}"#);
    }

    #[test]
    fn test_history_deserializes_role_and_content_only() {
        let history: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#,
        )
        .unwrap_or_default();
        assert_eq!(history, vec![user_message("hi"), assistant_message("hello")]);
    }

    #[test]
    fn test_standard_message_terminality() {
        let answer = StandardMessage::assistant(Some("done".to_string()), Vec::new());
        assert!(answer.is_terminal());
        let call = StandardMessage::assistant(
            Some("let me check".to_string()),
            vec![ToolCall::new("c", "price_tool", "{}")],
        );
        assert!(!call.is_terminal());
        assert_eq!(StandardMessage::default().text(), "");
    }

    #[test]
    fn test_into_turn_keeps_calls() {
        let turn = StandardMessage::assistant(None, vec![ToolCall::new("c", "price_tool", "{}")]).into_turn();
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.content.is_empty());
        assert_eq!(turn.tool_calls.len(), 1);
    }
}
