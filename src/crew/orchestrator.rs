//! Executes a crew's task graph.
//!
//! Every task whose dependencies allow it is dispatched onto a `JoinSet` as
//! soon as it becomes ready; the loop then waits for the next task to finish
//! (or for cancellation) and re-evaluates readiness.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agent::agent_execution::advance;
use crate::agent::{AgentRun, AgentRuntime, Assignment};
use crate::crew::graph::EdgeKind;
use crate::crew::output::CrewOutput;
use crate::crew::Crew;
use crate::task::output::TaskOutput;
use crate::task::status::{FailureReason, TaskStatus};

enum Readiness {
    Blocked,
    Ready,
    DependencyFailed(String),
}

type Finished = (usize, Result<AgentRun, JoinError>);

impl Crew {
    /// Execute every task and collect their outputs.
    ///
    /// Cancelling `cancel` aborts in-flight work; every task that has not
    /// reached a terminal state is then marked `Failed(Cancelled)`.
    pub async fn run(&self, cancel: CancellationToken) -> CrewOutput {
        let runtime = AgentRuntime {
            llm: Arc::clone(&self.llm),
            llm_config: self.llm_config.clone(),
            tools: Arc::clone(&self.tools),
            limiter: Arc::clone(&self.limiter),
            cancel: cancel.clone(),
        };

        let mut outputs: Vec<TaskOutput> = self
            .tasks
            .iter()
            .map(|t| TaskOutput::pending(&t.name, &t.agent, &t.description))
            .collect();
        let mut join_set: JoinSet<Finished> = JoinSet::new();
        let mut in_flight: Vec<AbortHandle> = Vec::new();

        info!(tasks = self.tasks.len(), process = %self.process, "crew run started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.dispatch_ready(&runtime, &mut outputs, &mut join_set, &mut in_flight);

            if join_set.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                joined = join_set.join_next() => joined,
            };

            match joined {
                Some(Ok((idx, result))) => self.record(&mut outputs[idx], result),
                Some(Err(e)) => error!(error = %e, "task supervisor failed"),
                None => break,
            }
        }

        if cancel.is_cancelled() {
            for handle in &in_flight {
                handle.abort();
            }
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
        }

        for output in outputs.iter_mut().filter(|o| !o.status.is_terminal()) {
            let reason = if cancel.is_cancelled() {
                FailureReason::Cancelled
            } else {
                FailureReason::Aborted("task could not be scheduled".to_string())
            };
            warn!(task = %output.task, reason = %reason, "task did not finish");
            advance(&mut output.status, TaskStatus::Failed(reason));
            output.finished_at = Some(Utc::now());
        }

        let crew_output = CrewOutput {
            tasks: outputs,
            final_task: self.final_task(),
        };
        info!(
            completed = crew_output.tasks.iter().filter(|t| t.status.is_completed()).count(),
            total = crew_output.tasks.len(),
            "crew run finished"
        );
        crew_output
    }

    /// Settle tasks whose completion dependencies failed and start every task
    /// that is ready. Repeats until nothing changes, since a cascaded failure
    /// can unblock further tasks.
    fn dispatch_ready(
        &self,
        runtime: &AgentRuntime,
        outputs: &mut [TaskOutput],
        join_set: &mut JoinSet<Finished>,
        in_flight: &mut Vec<AbortHandle>,
    ) {
        let mut changed = true;
        while changed {
            changed = false;
            for &idx in self.graph.order() {
                if outputs[idx].status != TaskStatus::Pending {
                    continue;
                }
                match self.readiness(idx, outputs) {
                    Readiness::Blocked => {}
                    Readiness::DependencyFailed(dependency) => {
                        warn!(task = %outputs[idx].task, dependency = %dependency, "dependency did not complete");
                        advance(
                            &mut outputs[idx].status,
                            TaskStatus::Failed(FailureReason::DependencyFailed { task: dependency }),
                        );
                        outputs[idx].finished_at = Some(Utc::now());
                        changed = true;
                    }
                    Readiness::Ready => {
                        let context = self.context_for(idx, outputs);
                        advance(&mut outputs[idx].status, TaskStatus::Running);
                        outputs[idx].started_at = Some(Utc::now());
                        in_flight.push(self.spawn_task(idx, context, runtime, join_set));
                    }
                }
            }
        }
    }

    fn readiness(&self, idx: usize, outputs: &[TaskOutput]) -> Readiness {
        for dependency in self.graph.dependencies(idx) {
            let upstream = &outputs[dependency.task];
            match (&upstream.status, dependency.kind) {
                (TaskStatus::Completed, _) => {}
                (TaskStatus::Failed(_), EdgeKind::Settled) => {}
                (TaskStatus::Failed(_), EdgeKind::Completion) => {
                    return Readiness::DependencyFailed(upstream.task.clone());
                }
                _ => return Readiness::Blocked,
            }
        }
        Readiness::Ready
    }

    fn context_for(&self, idx: usize, outputs: &[TaskOutput]) -> String {
        self.graph
            .dependencies(idx)
            .iter()
            .map(|d| outputs[d.task].as_context())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Start one task. The agent runs in its own Tokio task so that a panic
    /// is reported against the task that caused it.
    fn spawn_task(
        &self,
        idx: usize,
        context: String,
        runtime: &AgentRuntime,
        join_set: &mut JoinSet<Finished>,
    ) -> AbortHandle {
        let task = self.tasks[idx].clone();
        let agent = self.agents.handle(&task.agent).cloned();
        let coworkers = Arc::clone(&self.agents);
        let runtime = runtime.clone();

        debug!(task = %task.name, agent = %task.agent, "dispatching task");
        let work = tokio::spawn(async move {
            let Some(agent) = agent else {
                return AgentRun::aborted(format!("agent '{}' is not registered", task.agent));
            };
            let assignment = Assignment {
                description: &task.description,
                expected_output: &task.expected_output,
                context,
                tools: task.usable_tools(&agent.tools),
            };
            agent.execute(&runtime, &assignment, Some(coworkers.as_ref())).await
        });
        let abort = work.abort_handle();
        join_set.spawn(async move { (idx, work.await) });
        abort
    }

    fn record(&self, output: &mut TaskOutput, result: Result<AgentRun, JoinError>) {
        output.finished_at = Some(Utc::now());
        let run = match result {
            Ok(run) => run,
            Err(e) => {
                let reason = if e.is_cancelled() {
                    FailureReason::Cancelled
                } else {
                    FailureReason::Aborted(panic_message(e))
                };
                error!(task = %output.task, reason = %reason, "task job ended abnormally");
                advance(&mut output.status, TaskStatus::Failed(reason));
                return;
            }
        };

        output.tool_calls = run.tool_calls;
        output.delegations = run.delegations;
        output.iterations = run.iterations;
        output.completion_requests = run.completion_requests;
        output.input_tokens = run.input_tokens;
        output.output_tokens = run.output_tokens;
        match run.outcome {
            Ok(raw) => {
                info!(task = %output.task, agent = %output.agent, iterations = output.iterations, "task completed");
                output.raw = raw;
                advance(&mut output.status, TaskStatus::Completed);
            }
            Err(reason) => {
                warn!(task = %output.task, agent = %output.agent, reason = %reason, "task failed");
                advance(&mut output.status, TaskStatus::Failed(reason));
            }
        }
    }
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string()),
        Err(e) => e.to_string(),
    }
}
