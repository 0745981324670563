pub mod builder;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod output;
pub mod process;

#[cfg(test)]
mod tests;

pub use builder::CrewBuilder;
pub use error::{ConfigError, CrewError};
pub use graph::{Dependency, EdgeKind, TaskGraph};
pub use output::{CrewOutput, UsageMetrics};
pub use process::Process;

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentRegistry;
use crate::llm::{CompletionService, LlmConfig, RateLimiter};
use crate::task::Task;
use crate::tools::ToolRegistry;

/// A validated set of agents and tasks, ready to run.
///
/// Built by [`CrewBuilder`]; nothing about it changes afterwards.
pub struct Crew {
    agents: Arc<AgentRegistry>,
    tasks: Arc<Vec<Task>>,
    graph: TaskGraph,
    process: Process,
    manager: Option<String>,
    manager_task: Option<usize>,
    tools: Arc<ToolRegistry>,
    llm: Arc<dyn CompletionService>,
    llm_config: LlmConfig,
    limiter: Arc<RateLimiter>,
}

impl fmt::Debug for Crew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crew")
            .field("agents", &self.agents.len())
            .field("tasks", &self.tasks)
            .field("process", &self.process)
            .field("manager", &self.manager)
            .field("llm", &self.llm.name())
            .finish_non_exhaustive()
    }
}

impl Crew {
    pub fn builder() -> CrewBuilder {
        CrewBuilder::new()
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn process(&self) -> Process {
        self.process
    }

    /// Role of the manager in a hierarchical crew
    pub fn manager(&self) -> Option<&str> {
        self.manager.as_deref()
    }

    /// Task whose output is the crew's answer: the manager's task, or the
    /// last declared one.
    pub fn final_task(&self) -> usize {
        self.manager_task.unwrap_or(self.tasks.len().saturating_sub(1))
    }

    /// Run to completion and return the final answer
    pub async fn kickoff(&self) -> Result<String, CrewError> {
        self.run(CancellationToken::new()).await.result()
    }
}
