use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::agent::AgentSpec;
use crate::crew::CrewBuilder;
use crate::llm::{CompletionRequest, CompletionResponse, CompletionService, LlmError, RateLimiter};
use crate::tools::{Tool, ToolError, ToolInput, ToolRegistry};

/// One scripted completion reply
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Final answer repeating the latest user message
    Echo,
    Fail(String),
    Panic,
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Completion service double. Replies are queued per agent role, which is
/// read back from the system prompt. A role with an empty queue answers
/// `Final Answer: done`.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<(String, CompletionRequest)>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script<I, R>(self, role: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Reply>,
    {
        self.scripts
            .lock()
            .unwrap()
            .entry(role.to_string())
            .or_default()
            .extend(replies.into_iter().map(Into::into));
        self
    }

    pub fn delay(mut self, role: &str, delay: Duration) -> Self {
        self.delays.insert(role.to_string(), delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Requests made by `role`, oldest first
    pub fn requests_for(&self, role: &str) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == role)
            .map(|(_, req)| req.clone())
            .collect()
    }
}

pub fn role_of(request: &CompletionRequest) -> String {
    request
        .messages
        .first()
        .and_then(|m| m.content.strip_prefix("You are "))
        .and_then(|rest| rest.split(".\n").next())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl CompletionService for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let role = role_of(&request);
        if let Some(delay) = self.delays.get(&role) {
            tokio::time::sleep(*delay).await;
        }
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&role)
            .and_then(VecDeque::pop_front);
        let echo = format!("Final Answer: {}", request.last_user_message().unwrap_or_default());
        self.requests.lock().unwrap().push((role, request));

        match reply {
            Some(Reply::Text(text)) => Ok(CompletionResponse::text(text)),
            Some(Reply::Echo) => Ok(CompletionResponse::text(echo)),
            Some(Reply::Fail(message)) => Err(LlmError::Api { status: 503, message }),
            Some(Reply::Panic) => panic!("scripted panic"),
            None => Ok(CompletionResponse::text("Final Answer: done")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Tool answering with fixed text
pub struct StaticTool {
    pub name: String,
    pub output: String,
}

impl StaticTool {
    pub fn new(name: &str, output: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            output: output.into(),
        })
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns canned text."
    }

    async fn invoke(&self, _input: ToolInput) -> Result<String, ToolError> {
        Ok(self.output.clone())
    }
}

pub fn agent(role: &str) -> AgentSpec {
    AgentSpec::new(role, format!("Help with {}", role), "Test agent")
}

pub fn tools(list: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::default();
    for tool in list {
        registry.register(tool).unwrap();
    }
    Arc::new(registry)
}

/// Builder wired to `llm`, a private limiter and the given tools
pub fn crew_with(llm: Arc<ScriptedLlm>, tools: Arc<ToolRegistry>) -> CrewBuilder {
    CrewBuilder::new()
        .llm(llm)
        .tools(tools)
        .limiter(Arc::new(RateLimiter::per_minute()))
}
