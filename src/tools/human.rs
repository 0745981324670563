use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use super::{Tool, ToolError, ToolInput};

pub const HUMAN: &str = "human";

type Responder = Arc<dyn Fn(&str) -> io::Result<String> + Send + Sync>;

/// Asks the operator a question and returns their answer
pub struct HumanInputTool {
    responder: Responder,
}

impl HumanInputTool {
    /// Prompt on stderr and read one line from stdin
    pub fn stdin() -> Self {
        Self::with_responder(|question| {
            let mut stderr = io::stderr();
            writeln!(stderr, "\n[agent question] {}", question)?;
            write!(stderr, "> ")?;
            stderr.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim_end().to_string())
        })
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> io::Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
        }
    }
}

#[async_trait]
impl Tool for HumanInputTool {
    fn name(&self) -> &str {
        HUMAN
    }

    fn description(&self) -> &str {
        "Ask the human operator for guidance. Input: the question to ask."
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let question = input
            .arg("question")
            .ok_or_else(|| ToolError::InvalidInput("expected a question".to_string()))?;
        let responder = Arc::clone(&self.responder);

        tokio::task::spawn_blocking(move || responder(&question))
            .await
            .map_err(|e| ToolError::Unavailable(format!("input prompt aborted: {}", e)))?
            .map_err(|e| ToolError::Unavailable(format!("could not read operator input: {}", e)))
    }
}
