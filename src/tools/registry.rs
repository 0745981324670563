use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::text::{truncate_chars, DEFAULT_MAX_OUTPUT_CHARS};
use super::{Tool, ToolCall, ToolError, ToolInput};

/// Uniform entry point to every tool a crew may use.
///
/// The registry is the failure boundary for tools: whatever a tool does, the
/// caller gets back text no longer than `max_output_chars`. Failures turn into
/// an error marker instead of an error.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    max_output_chars: usize,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_CHARS)
    }
}

impl ToolRegistry {
    pub fn new(max_output_chars: usize) -> Self {
        Self {
            tools: BTreeMap::new(),
            max_output_chars,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, ToolError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn max_output_chars(&self) -> usize {
        self.max_output_chars
    }

    /// "name: description" lines for the given tools, as shown to an agent
    pub fn describe(&self, names: &[String]) -> String {
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Invoke a tool and return the text handed to the agent
    pub async fn invoke(&self, name: &str, input: ToolInput) -> String {
        self.call(name, input).await.result
    }

    /// Invoke a tool and record the call. Never fails.
    pub async fn call(&self, name: &str, input: ToolInput) -> ToolCall {
        let parameters = input.as_display();
        let start = Instant::now();

        let outcome = match self.tools.get(name) {
            Some(tool) => tool.invoke(input).await,
            None => Err(ToolError::NotFound(name.to_string())),
        };
        let elapsed = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                debug!(tool = name, elapsed_ms = elapsed, chars = text.len(), "tool call succeeded");
                ToolCall::new(
                    name.to_string(),
                    parameters,
                    truncate_chars(&text, self.max_output_chars),
                    elapsed,
                )
            }
            Err(error) => {
                warn!(tool = name, error = %error, "tool call failed, returning error marker");
                let marker = format!("[tool '{}' returned no result: {}]", name, error);
                ToolCall::with_error(
                    name.to_string(),
                    parameters,
                    truncate_chars(&marker, self.max_output_chars),
                    error.to_string(),
                    elapsed,
                )
            }
        }
    }
}
