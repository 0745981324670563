use serde::{Deserialize, Serialize};

/// Defines the persona an agent plays
/// Completely flexible - crews define their own roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRole {
    /// Name of the role (e.g., "Project Manager", "Data Analyst"); unique per crew
    pub name: String,
    /// Background that colours how the agent approaches its work
    pub backstory: String,
}

impl AgentRole {
    pub fn new(name: String, backstory: String) -> Self {
        Self { name, backstory }
    }

    /// Get a human-readable description of the role
    pub fn get_description(&self) -> String {
        if self.backstory.is_empty() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, self.backstory.trim())
        }
    }
}

/// Agent capabilities and limitations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCapabilities {
    /// Whether the agent may hand sub-work to coworkers
    pub allow_delegation: bool,
    /// Completion calls allowed per task before it fails
    pub max_iterations: u32,
    /// Completion calls allowed per minute; `None` is unthrottled
    pub max_requests_per_minute: Option<u32>,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            allow_delegation: false,
            max_iterations: 15,
            max_requests_per_minute: None,
        }
    }
}

impl AgentCapabilities {
    pub fn with_delegation(mut self, allowed: bool) -> Self {
        self.allow_delegation = allowed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_rpm(mut self, rpm: u32) -> Self {
        self.max_requests_per_minute = Some(rpm);
        self
    }
}
