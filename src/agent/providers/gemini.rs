//! Google Gemini provider (`generateContent` REST API).
//!
//! Gemini has no system role and no tool role in its content list, and it
//! does not assign IDs to function calls:
//!
//! - system text is folded into the next user turn behind a
//!   `[System instructions]` marker, then cleared;
//! - assistant tool calls become `functionCall` parts, tool results
//!   become `functionResponse` parts on a user turn;
//! - call IDs are synthesized per response as `gemini_tc_{n}`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::http::HttpClientBase;
use super::merge_adjacent;
use crate::agent::executor::parse_arguments;
use crate::agent::message::{ChatRequest, Role, StandardMessage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// Default Generative Language API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Marker prefixed to folded system instructions.
const SYSTEM_MARKER: &str = "[System instructions]";

/// Function name used when a tool result cannot be matched to its call.
const FALLBACK_FUNCTION_NAME: &str = "tool";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FunctionResponsePart {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FunctionDeclaration {
    name: String,
    description: String,
    parameters_json_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

fn text_part(text: String) -> GeminiPart {
    GeminiPart {
        text: Some(text),
        ..GeminiPart::default()
    }
}

fn content(role: &str, parts: Vec<GeminiPart>) -> GeminiContent {
    GeminiContent {
        role: role.to_string(),
        parts,
    }
}

fn fold_system(system: Option<String>, text: &str) -> String {
    match system {
        Some(system) => format!("{SYSTEM_MARKER}\n{system}\n\n{text}"),
        None => text.to_string(),
    }
}

fn declaration(def: &ToolDefinition) -> FunctionDeclaration {
    FunctionDeclaration {
        name: def.name.clone(),
        description: def.description.clone(),
        parameters_json_schema: def.parameters.clone(),
    }
}

/// Translates a generic request into a `generateContent` body.
pub(crate) fn build_request(request: &ChatRequest) -> GeminiRequest {
    let mut contents = Vec::with_capacity(request.messages.len());
    let mut pending_system: Option<String> = None;
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    for msg in &request.messages {
        match msg.role {
            Role::System => {
                pending_system = Some(match pending_system.take() {
                    Some(prev) => format!("{prev}\n\n{}", msg.content),
                    None => msg.content.clone(),
                });
            }
            Role::Tool => {
                let name = msg
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| call_names.get(id).copied())
                    .unwrap_or(FALLBACK_FUNCTION_NAME);
                contents.push(content(
                    "user",
                    vec![GeminiPart {
                        function_response: Some(FunctionResponsePart {
                            name: name.to_string(),
                            response: json!({ "result": msg.content }),
                        }),
                        ..GeminiPart::default()
                    }],
                ));
            }
            Role::Assistant if !msg.tool_calls.is_empty() => {
                call_names.clear();
                let parts = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        call_names.insert(tc.id.as_str(), tc.name());
                        GeminiPart {
                            function_call: Some(FunctionCallPart {
                                name: tc.name().to_string(),
                                args: Value::Object(parse_arguments(&tc.function.arguments)),
                            }),
                            ..GeminiPart::default()
                        }
                    })
                    .collect();
                contents.push(content("model", parts));
            }
            // Gemini rejects empty text parts.
            Role::Assistant if msg.content.is_empty() => {}
            Role::Assistant => {
                contents.push(content("model", vec![text_part(msg.content.clone())]));
            }
            Role::User => {
                let text = fold_system(pending_system.take(), &msg.content);
                contents.push(content("user", vec![text_part(text)]));
            }
        }
    }

    if let Some(system) = pending_system {
        contents.push(content("user", vec![text_part(fold_system(Some(system), ""))]));
    }

    let contents = merge_adjacent(contents, |c| c.role.as_str(), |a, b| a.parts.extend(b.parts));

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: request.tools.iter().map(declaration).collect(),
        }]
    };

    GeminiRequest {
        contents,
        tools,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

/// Normalises a `generateContent` response.
///
/// Only the first candidate is read. Text parts are joined with `\n`;
/// function calls get IDs `gemini_tc_0`, `gemini_tc_1`, ... in part order.
pub(crate) fn parse_response(response: GeminiResponse) -> Result<StandardMessage, AgentError> {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            texts.push(text);
        }
        if let Some(call) = part.function_call {
            let args = if call.args.is_null() { json!({}) } else { call.args };
            let arguments = serde_json::to_string(&args).map_err(|e| AgentError::ResponseParse {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;
            tool_calls.push(ToolCall::new(
                format!("gemini_tc_{}", tool_calls.len()),
                call.name,
                arguments,
            ));
        }
    }

    let content = (!texts.is_empty()).then(|| texts.join("\n"));
    Ok(StandardMessage::assistant(content, tool_calls))
}

/// Gemini `generateContent` provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base: HttpClientBase,
}

impl GeminiProvider {
    /// Creates a provider for `endpoint` (defaults to [`DEFAULT_GEMINI_BASE_URL`]).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, endpoint: Option<&str>, timeout: Duration) -> Result<Self, AgentError> {
        Ok(Self {
            base: HttpClientBase::new(
                "gemini",
                endpoint.unwrap_or(DEFAULT_GEMINI_BASE_URL),
                api_key,
                timeout,
            )?,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<StandardMessage, AgentError> {
        let url = self
            .base
            .build_url(&format!("v1beta/models/{}:generateContent", request.model));
        let body = build_request(request);

        info!(
            provider = self.base.provider,
            model = request.model.as_str(),
            contents = body.contents.len(),
            tools = request.tools.len(),
            "sending request to Gemini"
        );

        let response: GeminiResponse = self
            .base
            .post_with_key_header(&url, "x-goog-api-key", &[], &body)
            .await?;
        let message = parse_response(response)?;
        debug!(tool_calls = message.tool_calls.len(), "received Gemini response");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{
        assistant_message, assistant_tool_calls_message, system_message, tool_message, user_message,
    };

    fn request(messages: Vec<crate::agent::message::ChatMessage>, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            model: "gemini-2.0-flash".to_string(),
            messages,
            temperature: Some(0.3),
            max_tokens: Some(1024),
            tools,
        }
    }

    fn body(req: &ChatRequest) -> Value {
        serde_json::to_value(build_request(req)).unwrap_or_default()
    }

    fn response(value: Value) -> StandardMessage {
        let parsed: GeminiResponse = serde_json::from_value(value).unwrap_or_else(|_| unreachable!());
        parse_response(parsed).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_system_folded_into_first_user_turn_once() {
        let req = request(
            vec![system_message("Be grounded."), user_message("Q1"), assistant_message("A1"), user_message("Q2")],
            Vec::new(),
        );
        let b = body(&req);
        assert_eq!(b["contents"][0]["role"], "user");
        assert_eq!(b["contents"][0]["parts"][0]["text"], "[System instructions]\nBe grounded.\n\nQ1");
        assert_eq!(b["contents"][1]["role"], "model");
        assert_eq!(b["contents"][2]["parts"][0]["text"], "Q2");
        assert!(b.get("tools").is_none());
        assert_eq!(b["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_trailing_system_turn_is_not_lost() {
        let b = body(&request(vec![user_message("Q"), system_message("Late rule")], Vec::new()));
        let text = b["contents"][0]["parts"][1]["text"].as_str().unwrap_or_default();
        assert!(text.starts_with("[System instructions]\nLate rule"));
    }

    #[test]
    fn test_tool_round_trip_translation() {
        let req = request(
            vec![
                user_message("price?"),
                assistant_tool_calls_message(vec![
                    ToolCall::new("c1", "price_tool", r#"{"tickers":["NVDA"]}"#),
                    ToolCall::new("c2", "volatility_tool", "{invalid json"),
                ]),
                tool_message("c1", r#"{"NVDA":1}"#),
                tool_message("c2", r#"{"error":"x"}"#),
            ],
            vec![ToolDefinition {
                name: "price_tool".to_string(),
                description: "Prices".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
        );
        let b = body(&req);
        let model = &b["contents"][1];
        assert_eq!(model["role"], "model");
        assert_eq!(model["parts"][0]["functionCall"]["name"], "price_tool");
        assert_eq!(model["parts"][0]["functionCall"]["args"]["tickers"][0], "NVDA");
        assert_eq!(model["parts"][1]["functionCall"]["args"], json!({}));

        let results = &b["contents"][2];
        assert_eq!(results["role"], "user");
        assert_eq!(results["parts"][0]["functionResponse"]["name"], "price_tool");
        assert_eq!(results["parts"][0]["functionResponse"]["response"]["result"], r#"{"NVDA":1}"#);
        assert_eq!(results["parts"][1]["functionResponse"]["name"], "volatility_tool");
        assert_eq!(b["contents"].as_array().map_or(0, Vec::len), 3);

        assert_eq!(b["tools"][0]["functionDeclarations"][0]["name"], "price_tool");
        assert!(b["tools"][0]["functionDeclarations"][0]["parametersJsonSchema"].is_object());
    }

    #[test]
    fn test_empty_assistant_turn_is_dropped() {
        let b = body(&request(
            vec![user_message("Q1"), assistant_message(""), user_message("Q2")],
            Vec::new(),
        ));
        let contents = b["contents"].as_array().cloned().unwrap_or_default();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "Q1");
        assert_eq!(contents[0]["parts"][1]["text"], "Q2");
        assert!(contents.iter().all(|c| c["role"] != "model"));
    }

    #[test]
    fn test_unmatched_tool_result_uses_fallback_name() {
        let b = body(&request(vec![user_message("q"), tool_message("orphan", "{}")], Vec::new()));
        assert_eq!(b["contents"][0]["parts"][1]["functionResponse"]["name"], "tool");
    }

    #[test]
    fn test_parse_text_only() {
        let msg = response(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "NVDA fell"}, {"text": "sharply."}]}}]
        }));
        assert_eq!(msg.content.as_deref(), Some("NVDA fell\nsharply."));
        assert!(msg.is_terminal());
    }

    #[test]
    fn test_parse_function_calls_get_local_ids() {
        let msg = response(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "price_tool", "args": {"tickers": ["NVDA"]}}},
                {"functionCall": {"name": "ecosystem_tool"}}
            ]}}]
        }));
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls[0].id, "gemini_tc_0");
        assert_eq!(msg.tool_calls[1].id, "gemini_tc_1");
        assert_eq!(msg.tool_calls[1].function.arguments, "{}");
        let args: Value = serde_json::from_str(&msg.tool_calls[0].function.arguments).unwrap_or_default();
        assert_eq!(args["tickers"][0], "NVDA");
    }

    #[test]
    fn test_parse_no_candidates() {
        let msg = response(json!({}));
        assert_eq!(msg, StandardMessage::assistant(None, Vec::new()));
    }

    #[test]
    fn test_plain_text_round_trip_preserves_content() {
        let original = StandardMessage::assistant(Some("Answer: 42".to_string()), Vec::new());
        let req = request(vec![user_message("q"), original.clone().into_turn()], Vec::new());
        let sent = body(&req);
        let echoed = response(json!({ "candidates": [{ "content": sent["contents"][1] }] }));
        assert_eq!(echoed, original);
    }
}
