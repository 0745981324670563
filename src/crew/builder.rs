use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::agent::{AgentRegistry, AgentSpec};
use crate::crew::error::ConfigError;
use crate::crew::graph::TaskGraph;
use crate::crew::process::Process;
use crate::crew::Crew;
use crate::llm::{CompletionService, LlmConfig, RateLimiter};
use crate::task::{Task, TaskSpec};
use crate::tools::ToolRegistry;

/// Collects agents, tasks and collaborators, and validates the whole crew
/// in [`CrewBuilder::build`].
pub struct CrewBuilder {
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
    process: Process,
    manager: Option<String>,
    inputs: BTreeMap<String, String>,
    tools: Option<Arc<ToolRegistry>>,
    llm: Option<Arc<dyn CompletionService>>,
    llm_config: LlmConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl Default for CrewBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrewBuilder {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            tasks: Vec::new(),
            process: Process::default(),
            manager: None,
            inputs: BTreeMap::new(),
            tools: None,
            llm: None,
            llm_config: LlmConfig::default(),
            limiter: None,
        }
    }

    pub fn agent(mut self, spec: AgentSpec) -> Self {
        self.agents.push(spec);
        self
    }

    pub fn task(mut self, spec: TaskSpec) -> Self {
        self.tasks.push(spec);
        self
    }

    pub fn process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    /// Role of the manager agent. Without one, a hierarchical crew picks the
    /// only agent allowed to delegate.
    pub fn manager(mut self, role: impl Into<String>) -> Self {
        self.manager = Some(role.into());
        self
    }

    /// Run input bound into every goal and task text that leaves it unbound
    pub fn input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn CompletionService>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn llm_config(mut self, config: LlmConfig) -> Self {
        self.llm_config = config;
        self
    }

    /// Defaults to the process-wide limiter
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<Crew, ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::NoTasks);
        }
        let tools = self.tools.unwrap_or_default();

        let mut agents = AgentRegistry::new();
        for mut spec in self.agents {
            spec.goal = spec.goal.bind_missing(&self.inputs);
            for tool in &spec.tools {
                if !tools.contains(tool) {
                    return Err(ConfigError::UnknownTool {
                        owner: spec.role.clone(),
                        tool: tool.clone(),
                    });
                }
            }
            agents.register(spec)?;
        }

        let mut names = HashSet::new();
        let mut tasks: Vec<Task> = Vec::with_capacity(self.tasks.len());
        for (position, mut spec) in self.tasks.into_iter().enumerate() {
            spec.description = spec.description.bind_missing(&self.inputs);
            spec.expected_output = spec.expected_output.bind_missing(&self.inputs);
            let fallback = format!("task-{}", position + 1);
            let owner = spec.name.clone().unwrap_or_else(|| fallback.clone());

            if !names.insert(owner.clone()) {
                return Err(ConfigError::DuplicateTask(owner));
            }
            if !agents.contains(&spec.agent) {
                return Err(ConfigError::UnknownAgent {
                    task: owner,
                    agent: spec.agent,
                });
            }
            if let Some(tool) = spec.tools.iter().find(|t| !tools.contains(t)) {
                return Err(ConfigError::UnknownTool {
                    owner,
                    tool: tool.clone(),
                });
            }

            let task = spec
                .build(fallback)
                .map_err(|source| ConfigError::Template { owner, source })?;
            tasks.push(task);
        }

        let manager = match self.process {
            Process::Hierarchical => Some(resolve_manager(&agents, self.manager)?),
            Process::Flat => {
                if let Some(manager) = self.manager {
                    warn!(manager = %manager, "manager is ignored by a flat crew");
                }
                None
            }
        };

        let manager_task = match &manager {
            Some(manager) => {
                let owned: Vec<usize> = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| &t.agent == manager)
                    .map(|(i, _)| i)
                    .collect();
                if owned.len() != 1 {
                    return Err(ConfigError::ManagerTaskCount {
                        manager: manager.clone(),
                        count: owned.len(),
                    });
                }
                Some(owned[0])
            }
            None => None,
        };

        let graph = TaskGraph::build(&tasks, manager_task)?;

        let llm = match self.llm {
            Some(llm) => llm,
            None => self
                .llm_config
                .build_service()
                .map_err(|e| ConfigError::InvalidDefinition(e.to_string()))?,
        };

        debug!(
            agents = agents.len(),
            tasks = tasks.len(),
            process = %self.process,
            "crew assembled"
        );

        Ok(Crew {
            agents: Arc::new(agents),
            tasks: Arc::new(tasks),
            graph,
            process: self.process,
            manager,
            manager_task,
            tools,
            llm,
            llm_config: self.llm_config,
            limiter: self.limiter.unwrap_or_else(RateLimiter::global),
        })
    }
}

fn resolve_manager(agents: &AgentRegistry, requested: Option<String>) -> Result<String, ConfigError> {
    match requested {
        Some(role) => match agents.get(&role) {
            None => Err(ConfigError::UnknownManager(role)),
            Some(agent) if !agent.can_delegate() => Err(ConfigError::ManagerCannotDelegate(role)),
            Some(_) => Ok(role),
        },
        None => {
            let candidates: Vec<String> = agents
                .iter()
                .filter(|a| a.can_delegate())
                .map(|a| a.name().to_string())
                .collect();
            match candidates.len() {
                0 => Err(ConfigError::ManagerNotDesignated),
                1 => Ok(candidates.into_iter().next().unwrap_or_default()),
                _ => Err(ConfigError::AmbiguousManager(candidates)),
            }
        }
    }
}
