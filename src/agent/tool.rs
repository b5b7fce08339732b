//! Tool type definitions for function-calling.
//!
//! Provider-agnostic types for tool schemas, the calls a model emits,
//! and the per-exchange log of executed calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a registry entry).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Wraps the definition in the `{"type": "function", "function": ...}`
    /// envelope used on the wire and in `tools list` output.
    #[must_use]
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            kind: ToolKind::Function,
            function: self.clone(),
        }
    }
}

/// Kind tag for tool schemas and calls. Only functions exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// A callable function.
    #[default]
    Function,
}

/// Serialized tool schema: `{type: "function", function: {name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Always [`ToolKind::Function`].
    #[serde(rename = "type")]
    pub kind: ToolKind,
    /// The function definition.
    pub function: ToolDefinition,
}

/// Function name and JSON-encoded arguments of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

/// A tool call requested by the LLM.
///
/// The `id` links the call to the tool-result turn that answers it and
/// must stay stable for the lifetime of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier (provider-assigned or synthesized).
    pub id: String,
    /// Always [`ToolKind::Function`].
    #[serde(rename = "type", default)]
    pub kind: ToolKind,
    /// Function name and arguments.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Creates a function call.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ToolKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Record of one executed tool call, kept in the per-exchange log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    /// Tool name as requested by the model.
    pub tool: String,
    /// Parsed arguments (empty when the model sent malformed JSON).
    pub arguments: Map<String, Value>,
    /// Leading characters of the JSON result.
    pub result_preview: String,
}

impl ToolExecutionRecord {
    /// Arguments rendered as compact JSON.
    #[must_use]
    pub fn arguments_json(&self) -> String {
        json!(self.arguments).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_wire_shape() {
        let call = ToolCall::new("call_1", "price_tool", r#"{"tickers":["NVDA"]}"#);
        let value = serde_json::to_value(&call).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "id": "call_1",
                "type": "function",
                "function": {"name": "price_tool", "arguments": "{\"tickers\":[\"NVDA\"]}"}
            })
        );
        assert_eq!(call.name(), "price_tool");
    }

    #[test]
    fn test_tool_call_type_defaults_when_absent() {
        let call: ToolCall = serde_json::from_str(
            r#"{"id":"x","function":{"name":"volatility_tool","arguments":"{}"}}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(call.kind, ToolKind::Function);
    }

    #[test]
    fn test_schema_envelope() {
        let def = ToolDefinition {
            name: "ecosystem_tool".to_string(),
            description: "Compare tickers".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        };
        let schema = serde_json::to_value(def.to_schema()).unwrap_or_default();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "ecosystem_tool");
    }

    #[test]
    fn test_record_arguments_json() {
        let mut arguments = Map::new();
        arguments.insert("ticker".to_string(), json!("AMD"));
        let record = ToolExecutionRecord {
            tool: "volatility_tool".to_string(),
            arguments,
            result_preview: "{}".to_string(),
        };
        assert_eq!(record.arguments_json(), r#"{"ticker":"AMD"}"#);
    }
}
