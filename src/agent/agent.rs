use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

use crate::agent::role::{AgentCapabilities, AgentRole};
use crate::task::template::{TemplateError, TemplatedText};

/// Static description of an agent; rendered into an [`Agent`] on registration
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: String,
    pub goal: TemplatedText,
    pub backstory: String,
    pub capabilities: AgentCapabilities,
    /// Tools used by this agent's tasks when a task lists none
    pub tools: Vec<String>,
    pub verbose: bool,
}

impl AgentSpec {
    pub fn new(role: impl Into<String>, goal: impl Into<TemplatedText>, backstory: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            capabilities: AgentCapabilities::default(),
            tools: Vec::new(),
            verbose: false,
        }
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn allow_delegation(mut self, allowed: bool) -> Self {
        self.capabilities.allow_delegation = allowed;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.capabilities.max_iterations = max_iterations;
        self
    }

    pub fn max_rpm(mut self, rpm: u32) -> Self {
        self.capabilities.max_requests_per_minute = Some(rpm);
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> Result<Agent, TemplateError> {
        Ok(Agent {
            id: uuid::Uuid::new_v4().to_string(),
            goal: self.goal.render()?,
            role: AgentRole::new(self.role, self.backstory),
            capabilities: self.capabilities,
            tools: self.tools,
            verbose: self.verbose,
        })
    }
}

/// Core Agent structure. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub role: AgentRole,
    pub goal: String,
    pub capabilities: AgentCapabilities,
    pub tools: Vec<String>,
    pub verbose: bool,
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.role.name
    }

    pub fn can_delegate(&self) -> bool {
        self.capabilities.allow_delegation
    }
}

/// Shared, read-only reference to a registered agent
#[derive(Debug, Clone)]
pub struct AgentHandle(Arc<Agent>);

impl AgentHandle {
    pub(crate) fn new(agent: Agent) -> Self {
        Self(Arc::new(agent))
    }
}

impl Deref for AgentHandle {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.0
    }
}
