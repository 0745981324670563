use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a task ended in `Failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum FailureReason {
    #[error("iteration limit of {limit} exceeded")]
    IterationLimitExceeded { limit: u32 },
    #[error("cancelled")]
    Cancelled,
    #[error("dependency '{task}' did not complete")]
    DependencyFailed { task: String },
    #[error("completion service failed: {0}")]
    Completion(String),
    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Lifecycle: `Pending -> Running -> Completed | Failed`, or
/// `Pending -> Failed` when a task never gets to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("illegal task transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed(_))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            TaskStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn transition(&mut self, next: TaskStatus) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (&*self, &next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed(_))
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed(_))
        );
        if !allowed {
            return Err(InvalidTransition { from: self.clone(), to: next });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}
