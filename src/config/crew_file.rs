use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::agent::{AgentCapabilities, AgentSpec};
use crate::crew::{ConfigError, CrewBuilder, Process};
use crate::task::TaskSpec;

/// The real-estate research crew, bundled with the binary
pub const REAL_ESTATE_CREW: &str = include_str!("../../crews/real_estate.toml");

/// Declarative crew, as written in a crew TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewDefinition {
    #[serde(default)]
    pub process: Process,
    pub manager: Option<String>,
    /// Default values for template placeholders
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub agents: Vec<AgentDefinition>,
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub allow_delegation: bool,
    pub max_iter: Option<u32>,
    pub max_rpm: Option<u32>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub expected_output: String,
    pub agent: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub async_execution: bool,
    #[serde(default)]
    pub context: Vec<String>,
}

impl CrewDefinition {
    pub fn real_estate() -> Result<Self, ConfigError> {
        Self::from_toml_str(REAL_ESTATE_CREW)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidDefinition(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidDefinition(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Builder holding this definition's agents, tasks and default inputs.
    /// Inputs set on the returned builder replace the defaults.
    pub fn into_builder(self) -> CrewBuilder {
        let mut builder = CrewBuilder::new().process(self.process);
        if let Some(manager) = self.manager {
            builder = builder.manager(manager);
        }
        for (name, value) in self.inputs {
            builder = builder.input(name, value);
        }
        for agent in self.agents {
            builder = builder.agent(agent.into_spec());
        }
        for task in self.tasks {
            builder = builder.task(task.into_spec());
        }
        builder
    }
}

impl AgentDefinition {
    fn into_spec(self) -> AgentSpec {
        let mut capabilities = AgentCapabilities::default().with_delegation(self.allow_delegation);
        if let Some(max_iter) = self.max_iter {
            capabilities = capabilities.with_max_iterations(max_iter);
        }
        if let Some(rpm) = self.max_rpm {
            capabilities = capabilities.with_max_rpm(rpm);
        }
        AgentSpec::new(self.role, self.goal, self.backstory.trim())
            .with_capabilities(capabilities)
            .with_tools(self.tools)
            .verbose(self.verbose)
    }
}

impl TaskDefinition {
    fn into_spec(self) -> TaskSpec {
        let mut spec = TaskSpec::new(self.description.trim(), self.expected_output, self.agent)
            .with_tools(self.tools)
            .async_execution(self.async_execution)
            .with_context(self.context);
        if let Some(name) = self.name {
            spec = spec.named(name);
        }
        spec
    }
}
