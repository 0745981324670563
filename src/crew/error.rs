use crate::task::status::FailureReason;
use crate::task::template::TemplateError;

/// Problems found while assembling a crew. Nothing has run when one of these
/// is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("an agent with role '{0}' is already registered")]
    DuplicateRole(String),
    #[error("task '{task}' is bound to unknown agent '{agent}'")]
    UnknownAgent { task: String, agent: String },
    #[error("'{owner}' refers to unknown tool '{tool}'")]
    UnknownTool { owner: String, tool: String },
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },
    #[error("task '{task}' depends on '{dependency}', which is declared after it")]
    ForwardDependency { task: String, dependency: String },
    #[error("dependency cycle: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),
    #[error("task name '{0}' is used more than once")]
    DuplicateTask(String),
    #[error("crew has no tasks")]
    NoTasks,
    #[error("hierarchical crew needs a manager but no agent may delegate")]
    ManagerNotDesignated,
    #[error("several agents may delegate, name the manager explicitly: {}", .0.join(", "))]
    AmbiguousManager(Vec<String>),
    #[error("manager '{0}' is not a registered agent")]
    UnknownManager(String),
    #[error("manager '{0}' is not allowed to delegate")]
    ManagerCannotDelegate(String),
    #[error("manager '{manager}' must own exactly one task, found {count}")]
    ManagerTaskCount { manager: String, count: usize },
    #[error("template of '{owner}': {source}")]
    Template {
        owner: String,
        #[source]
        source: TemplateError,
    },
    #[error("invalid crew definition: {0}")]
    InvalidDefinition(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("task '{task}' failed: {reason}")]
    TaskFailed { task: String, reason: FailureReason },
    #[error("crew run was cancelled")]
    Cancelled,
}
