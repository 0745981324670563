use serde::{Deserialize, Serialize};

use crate::crew::error::CrewError;
use crate::task::output::TaskOutput;
use crate::task::status::{FailureReason, TaskStatus};

/// Counters collected over a whole crew run, delegated work included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub completion_requests: u32,
    /// Zero when the backend does not report token counts
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_calls: usize,
    pub failed_tool_calls: usize,
    pub delegations: usize,
}

/// Result of a crew run: one record per task, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    pub tasks: Vec<TaskOutput>,
    /// Index of the task whose output is the crew's answer
    pub final_task: usize,
}

impl CrewOutput {
    pub fn task(&self, name: &str) -> Option<&TaskOutput> {
        self.tasks.iter().find(|t| t.task == name)
    }

    pub fn final_output(&self) -> Option<&TaskOutput> {
        self.tasks.get(self.final_task)
    }

    /// The final answer, or why there is none
    pub fn result(&self) -> Result<String, CrewError> {
        let Some(last) = self.final_output() else {
            return Err(CrewError::Cancelled);
        };
        match &last.status {
            TaskStatus::Completed => Ok(last.raw.clone()),
            TaskStatus::Failed(FailureReason::Cancelled) => Err(CrewError::Cancelled),
            TaskStatus::Failed(reason) => Err(CrewError::TaskFailed {
                task: last.task.clone(),
                reason: reason.clone(),
            }),
            other => Err(CrewError::TaskFailed {
                task: last.task.clone(),
                reason: FailureReason::Aborted(format!("run ended while task was {}", other)),
            }),
        }
    }

    pub fn usage(&self) -> UsageMetrics {
        let mut usage = UsageMetrics::default();
        for task in &self.tasks {
            usage.completion_requests += task.completion_requests;
            usage.input_tokens += task.input_tokens;
            usage.output_tokens += task.output_tokens;
            usage.tool_calls += task.tool_calls.len();
            usage.failed_tool_calls += task.tool_calls.iter().filter(|c| c.is_degraded()).count();
            usage.delegations += task.delegations.len();
            for delegated in &task.delegations {
                usage.completion_requests += delegated.iterations;
                usage.input_tokens += delegated.input_tokens;
                usage.output_tokens += delegated.output_tokens;
                usage.tool_calls += delegated.tool_calls.len();
                usage.failed_tool_calls += delegated.tool_calls.iter().filter(|c| c.is_degraded()).count();
            }
        }
        usage
    }

    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_completed())
    }

    /// Plain-text run summary: one status line per task, then the final answer
    pub fn report(&self) -> String {
        let mut report = String::from("Task summary:\n");
        for task in &self.tasks {
            let duration = task
                .duration_ms()
                .map(|ms| format!(", {} ms", ms))
                .unwrap_or_default();
            report.push_str(&format!(
                "- {} [{}]: {} ({} iterations, {} tool calls, {} delegations{})\n",
                task.task,
                task.agent,
                task.status,
                task.iterations,
                task.tool_calls.len(),
                task.delegations.len(),
                duration
            ));
        }

        let usage = self.usage();
        report.push_str(&format!(
            "\nCompletion requests: {} ({} input / {} output tokens), tool calls: {} ({} failed), delegations: {}\n",
            usage.completion_requests,
            usage.input_tokens,
            usage.output_tokens,
            usage.tool_calls,
            usage.failed_tool_calls,
            usage.delegations
        ));

        match self.result() {
            Ok(answer) => report.push_str(&format!("\n{}\n", answer)),
            Err(e) => report.push_str(&format!("\nNo final report: {}\n", e)),
        }
        report
    }
}
