pub mod human;
pub mod registry;
pub mod search;
pub mod text;
pub mod web_fetch;

pub use human::HumanInputTool;
pub use registry::ToolRegistry;
pub use search::SearchTool;
pub use text::{html_to_text, truncate_chars, DEFAULT_MAX_OUTPUT_CHARS};
pub use web_fetch::ReadWebpageTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload an agent hands to a tool: either free text or a JSON object
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    Text(String),
    Json(Value),
}

impl ToolInput {
    /// Parse an `Action Input` line: JSON objects stay structured, anything
    /// else is plain text with surrounding quotes removed.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value @ Value::Object(_)) => ToolInput::Json(value),
            _ => ToolInput::Text(trimmed.trim_matches('"').to_string()),
        }
    }

    /// Look up a named argument. Text input answers every key; JSON input
    /// falls back to its only string field when `key` is absent.
    pub fn arg(&self, key: &str) -> Option<String> {
        match self {
            ToolInput::Text(text) => Some(text.clone()).filter(|t| !t.is_empty()),
            ToolInput::Json(Value::Object(map)) => match map.get(key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
                None => {
                    let mut strings = map.values().filter_map(Value::as_str);
                    match (strings.next(), strings.next()) {
                        (Some(only), None) => Some(only.to_string()),
                        _ => None,
                    }
                }
            },
            ToolInput::Json(other) => Some(other.to_string()),
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            ToolInput::Text(text) => text.clone(),
            ToolInput::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for ToolInput {
    fn from(text: &str) -> Self {
        ToolInput::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("tool unavailable: {0}")]
    Unavailable(String),
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("no tool named '{0}'")]
    NotFound(String),
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(error: reqwest::Error) -> Self {
        ToolError::Unavailable(error.to_string())
    }
}

/// External capability callable by an agent. Implementations are stateless
/// and shared read-only across agents.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError>;
}

/// Detailed information about a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool that was called
    pub tool_name: String,
    /// Input passed to the tool
    pub parameters: String,
    /// Text handed back to the agent (capped, error marker on failure)
    pub result: String,
    /// Time taken to execute the tool in milliseconds
    pub execution_time_ms: u64,
    /// Any error that occurred during tool execution
    pub error: Option<String>,
}

impl ToolCall {
    pub fn new(tool_name: String, parameters: String, result: String, execution_time_ms: u64) -> Self {
        Self {
            tool_name,
            parameters,
            result,
            execution_time_ms,
            error: None,
        }
    }

    pub fn with_error(
        tool_name: String,
        parameters: String,
        result: String,
        error: String,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            tool_name,
            parameters,
            result,
            execution_time_ms,
            error: Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_keeps_objects_structured() {
        assert_eq!(
            ToolInput::parse(r#"{"url": "https://example.com"}"#),
            ToolInput::Json(json!({"url": "https://example.com"}))
        );
        assert_eq!(
            ToolInput::parse("  \"homes for sale in Anytown\" "),
            ToolInput::Text("homes for sale in Anytown".to_string())
        );
        assert_eq!(ToolInput::parse("42"), ToolInput::Text("42".to_string()));
    }

    #[test]
    fn arg_falls_back_to_single_string_field() {
        let input = ToolInput::Json(json!({"search_query": "Anytown rent prices"}));
        assert_eq!(input.arg("query").as_deref(), Some("Anytown rent prices"));

        let ambiguous = ToolInput::Json(json!({"a": "x", "b": "y"}));
        assert_eq!(ambiguous.arg("query"), None);

        assert_eq!(ToolInput::from("").arg("query"), None);
    }
}
