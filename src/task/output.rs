use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::status::{FailureReason, TaskStatus};
use crate::tools::ToolCall;

/// Kind of sub-instruction a manager hands to a coworker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationKind {
    Work,
    Question,
}

/// A nested task created by delegation. Follows the same lifecycle as a
/// top-level task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegatedTask {
    pub kind: DelegationKind,
    pub delegated_by: String,
    pub coworker: String,
    pub instruction: String,
    pub status: TaskStatus,
    pub output: String,
    pub tool_calls: Vec<ToolCall>,
    pub iterations: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result record of one task of a crew run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    pub description: String,
    pub status: TaskStatus,
    /// Final answer; empty unless the task completed
    pub raw: String,
    pub tool_calls: Vec<ToolCall>,
    pub delegations: Vec<DelegatedTask>,
    pub iterations: u32,
    pub completion_requests: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskOutput {
    pub fn pending(task: &str, agent: &str, description: &str) -> Self {
        Self {
            task: task.to_string(),
            agent: agent.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            raw: String::new(),
            tool_calls: Vec::new(),
            delegations: Vec::new(),
            iterations: 0,
            completion_requests: 0,
            input_tokens: 0,
            output_tokens: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.status.failure()
    }

    /// How this task is presented to tasks that depend on it
    pub fn as_context(&self) -> String {
        match &self.status {
            TaskStatus::Completed => format!("## {} ({})\n{}", self.task, self.agent, self.raw),
            TaskStatus::Failed(reason) => format!(
                "## {} ({})\n[This task failed and produced no result: {}]",
                self.task, self.agent, reason
            ),
            other => format!("## {} ({})\n[No result yet: {}]", self.task, self.agent, other),
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
