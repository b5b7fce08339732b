//! Tool registry that dispatches model tool calls to analysis tools.
//!
//! Every outcome, including unknown names, tool errors and panics, comes
//! back as a JSON string the model can read. Nothing here returns an error
//! to the orchestration loop.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::config::DEFAULT_TOOL_ERROR_CHARS;
use super::tool::ToolDefinition;
use crate::error::{ToolError, truncate_chars};

/// Maximum raw byte length of tool argument JSON accepted from the model.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// Keyword arguments passed to a tool.
pub type ToolArgs = Map<String, Value>;

/// An analysis tool callable by the model.
pub trait Tool: Send + Sync {
    /// Schema advertised to the model. `definition().name` is the dispatch key.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool. Missing arguments take the tool's defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when arguments are invalid or data is missing.
    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError>;
}

/// Parses model-emitted arguments into a keyword map.
///
/// Malformed JSON, oversized payloads and non-object values all degrade
/// to an empty map so the tool runs with its defaults.
#[must_use]
pub fn parse_arguments(raw: &str) -> ToolArgs {
    if raw.len() > MAX_TOOL_ARGS_LEN {
        warn!(len = raw.len(), "tool arguments too large, using defaults");
        return ToolArgs::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => ToolArgs::new(),
        Err(e) => {
            debug!(error = %e, "malformed tool arguments, using defaults");
            ToolArgs::new()
        }
    }
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Static name → tool mapping.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    error_chars: Option<usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition name, replacing any previous one.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Registers a tool under its definition name, replacing any previous one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Sets how many characters of a failure message reach the model.
    #[must_use]
    pub const fn with_error_chars(mut self, chars: usize) -> Self {
        self.error_chars = Some(chars);
        self
    }

    /// Schemas of all registered tools, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Executes `name` with `args` and returns a JSON string.
    ///
    /// - unknown tool: `{"error": "Unknown tool: <name>"}`
    /// - tool error or panic: `{"error": "Tool execution failed: <message>"}`,
    ///   message truncated to the configured length
    /// - success: the tool's JSON result
    #[must_use]
    pub fn execute(&self, name: &str, args: &ToolArgs) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "unknown tool requested");
            return error_payload(&format!("Unknown tool: {name}"));
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| tool.run(args)))
            .unwrap_or_else(|payload| Err(ToolError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(value) => {
                debug!(tool = name, "tool succeeded");
                value.to_string()
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool failed");
                let limit = self.error_chars.unwrap_or(DEFAULT_TOOL_ERROR_CHARS);
                error_payload(&format!(
                    "Tool execution failed: {}",
                    truncate_chars(&e.to_string(), limit)
                ))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish_non_exhaustive()
    }
}
