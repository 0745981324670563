use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::agent::Agent;
use crate::agent::output_parser::{parse_reply, AgentAction, DelegationRequest};
use crate::agent::registry::AgentRegistry;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, CompletionService, LlmConfig, LlmError, RateLimiter};
use crate::task::output::{DelegatedTask, DelegationKind};
use crate::task::status::{FailureReason, TaskStatus};
use crate::tools::{ToolCall, ToolRegistry};

const OBSERVATION_STOP: &str = "\nObservation:";
const RETRY_BACKOFF: Duration = Duration::from_millis(250);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(4);

/// Everything an agent needs to execute, shared by all tasks of a run
#[derive(Clone)]
pub struct AgentRuntime {
    pub llm: Arc<dyn CompletionService>,
    pub llm_config: LlmConfig,
    pub tools: Arc<ToolRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub cancel: CancellationToken,
}

/// The work handed to an agent for one task
#[derive(Debug, Clone)]
pub struct Assignment<'a> {
    pub description: &'a str,
    pub expected_output: &'a str,
    /// Upstream outputs, already formatted
    pub context: String,
    /// Tools the agent may call for this assignment
    pub tools: &'a [String],
}

/// Record of one agent execution
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: Result<String, FailureReason>,
    pub tool_calls: Vec<ToolCall>,
    pub delegations: Vec<DelegatedTask>,
    pub iterations: u32,
    pub completion_requests: u32,
    /// Token counts as reported by the backend, nested delegations excluded
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AgentRun {
    fn new() -> Self {
        Self {
            outcome: Err(FailureReason::Cancelled),
            tool_calls: Vec::new(),
            delegations: Vec::new(),
            iterations: 0,
            completion_requests: 0,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub(crate) fn aborted(reason: String) -> Self {
        Self::new().finish(Err(FailureReason::Aborted(reason)))
    }

    fn finish(mut self, outcome: Result<String, FailureReason>) -> Self {
        self.outcome = outcome;
        self
    }
}

type DelegationFuture<'a> = Pin<Box<dyn Future<Output = DelegatedTask> + Send + 'a>>;

impl Agent {
    /// Run the agent's plan/act loop for one assignment.
    ///
    /// Each completion call is one iteration. `coworkers` enables the
    /// delegation actions when the agent is allowed to delegate.
    pub async fn execute(
        &self,
        runtime: &AgentRuntime,
        assignment: &Assignment<'_>,
        coworkers: Option<&AgentRegistry>,
    ) -> AgentRun {
        let mut run = AgentRun::new();
        let coworkers = coworkers.filter(|_| self.can_delegate());
        let mut messages = self.build_initial_messages(assignment, &runtime.tools, coworkers);
        let max_iterations = self.capabilities.max_iterations;
        let mut consecutive_errors = 0u32;

        for iteration in 1..=max_iterations {
            run.iterations = iteration;

            let request = CompletionRequest::new(runtime.llm_config.model.clone(), messages.clone())
                .with_temperature(runtime.llm_config.temperature)
                .with_max_tokens(runtime.llm_config.max_tokens)
                .with_stop(vec![OBSERVATION_STOP.to_string()]);

            let reply = tokio::select! {
                biased;
                _ = runtime.cancel.cancelled() => return run.finish(Err(FailureReason::Cancelled)),
                reply = self.throttled_completion(runtime, request) => reply,
            };
            run.completion_requests += 1;

            let reply = match reply {
                Ok(response) => {
                    consecutive_errors = 0;
                    run.input_tokens += u64::from(response.input_tokens.unwrap_or(0));
                    run.output_tokens += u64::from(response.output_tokens.unwrap_or(0));
                    response.content
                }
                Err(e) if iteration == max_iterations => {
                    return run.finish(Err(FailureReason::Completion(e.to_string())));
                }
                Err(e) => {
                    let delay = retry_backoff(consecutive_errors);
                    consecutive_errors += 1;
                    warn!(
                        agent = %self.role.name,
                        iteration,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "completion failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = runtime.cancel.cancelled() => return run.finish(Err(FailureReason::Cancelled)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            let action = parse_reply(&reply);
            let observation = match action {
                AgentAction::Finish(answer) => {
                    self.log_step(iteration, "final answer", &answer);
                    return run.finish(Ok(answer));
                }
                AgentAction::UseTool { tool, input } => {
                    self.log_step(iteration, &format!("using tool {}", tool), &input.as_display());
                    if !assignment.tools.iter().any(|t| t == &tool) {
                        format!(
                            "Tool '{}' is not available to you. Available tools: {}",
                            tool,
                            if assignment.tools.is_empty() { "none".to_string() } else { assignment.tools.join(", ") }
                        )
                    } else {
                        let call = tokio::select! {
                            biased;
                            _ = runtime.cancel.cancelled() => return run.finish(Err(FailureReason::Cancelled)),
                            call = runtime.tools.call(&tool, input) => call,
                        };
                        let result = call.result.clone();
                        run.tool_calls.push(call);
                        result
                    }
                }
                AgentAction::Delegate(request) => match coworkers {
                    Some(registry) => {
                        self.log_step(iteration, &format!("delegating to {}", request.coworker), &request.instruction);
                        let delegated = self.delegate(runtime, registry, request).await;
                        if delegated.status == TaskStatus::Failed(FailureReason::Cancelled) {
                            run.delegations.push(delegated);
                            return run.finish(Err(FailureReason::Cancelled));
                        }
                        let observation = match &delegated.status {
                            TaskStatus::Completed => delegated.output.clone(),
                            other => format!("[{} could not complete the request: {}]", delegated.coworker, other),
                        };
                        run.delegations.push(delegated);
                        observation
                    }
                    None => "Delegation is not available to you. Use your own tools or give your Final Answer.".to_string(),
                },
                AgentAction::Malformed(problem) => problem,
            };

            messages.push(ChatMessage::assistant(strip_hallucinated_observation(&reply)));
            messages.push(ChatMessage::user(format!("Observation: {}", observation)));
        }

        warn!(agent = %self.role.name, limit = max_iterations, "iteration limit exceeded");
        run.finish(Err(FailureReason::IterationLimitExceeded { limit: max_iterations }))
    }

    async fn throttled_completion(
        &self,
        runtime: &AgentRuntime,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        if let Some(rpm) = self.capabilities.max_requests_per_minute {
            runtime.limiter.acquire(&self.role.name, rpm).await;
        }
        runtime.llm.complete(request).await
    }

    /// Run a delegated sub-instruction as a nested task of `coworker`.
    /// Nested tasks cannot delegate further.
    fn delegate<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        registry: &'a AgentRegistry,
        request: DelegationRequest,
    ) -> DelegationFuture<'a> {
        Box::pin(async move {
            let mut delegated = DelegatedTask {
                kind: request.kind,
                delegated_by: self.role.name.clone(),
                coworker: request.coworker.clone(),
                instruction: request.instruction.clone(),
                status: TaskStatus::Pending,
                output: String::new(),
                tool_calls: Vec::new(),
                iterations: 0,
                input_tokens: 0,
                output_tokens: 0,
            };

            let coworker = match registry.get(&request.coworker) {
                Some(agent) if agent.name() != self.name() => agent,
                _ => {
                    let names: Vec<&str> = registry.coworkers_of(self.name()).map(|a| a.name()).collect();
                    delegated.status = TaskStatus::Failed(FailureReason::Aborted(format!(
                        "no coworker named '{}'; choose one of: {}",
                        request.coworker,
                        names.join(", ")
                    )));
                    return delegated;
                }
            };

            advance(&mut delegated.status, TaskStatus::Running);
            let expected_output = match request.kind {
                DelegationKind::Work => "Your complete answer to the delegated task.",
                DelegationKind::Question => "A clear, direct answer to the question.",
            };
            let assignment = Assignment {
                description: &request.instruction,
                expected_output,
                context: request.context.clone(),
                tools: &coworker.tools,
            };

            let nested = coworker.execute(runtime, &assignment, None).await;
            delegated.tool_calls = nested.tool_calls;
            delegated.iterations = nested.iterations;
            delegated.input_tokens = nested.input_tokens;
            delegated.output_tokens = nested.output_tokens;
            match nested.outcome {
                Ok(output) => {
                    delegated.output = output;
                    advance(&mut delegated.status, TaskStatus::Completed);
                }
                Err(reason) => advance(&mut delegated.status, TaskStatus::Failed(reason)),
            }
            debug!(
                coworker = %delegated.coworker,
                status = %delegated.status,
                "delegated task finished"
            );
            delegated
        })
    }

    fn log_step(&self, iteration: u32, step: &str, detail: &str) {
        if self.verbose {
            info!(agent = %self.role.name, iteration, "{}: {}", step, detail);
        } else {
            debug!(agent = %self.role.name, iteration, "{}: {}", step, detail);
        }
    }
}

/// Doubles per consecutive failed completion call, capped
fn retry_backoff(consecutive_errors: u32) -> Duration {
    RETRY_BACKOFF
        .saturating_mul(1u32 << consecutive_errors.min(8))
        .min(MAX_RETRY_BACKOFF)
}

pub(crate) fn advance(status: &mut TaskStatus, next: TaskStatus) {
    if let Err(e) = status.transition(next) {
        warn!(error = %e, "ignoring task status update");
    }
}

/// Models sometimes invent the observation themselves; keep only what they
/// actually asked for.
fn strip_hallucinated_observation(reply: &str) -> &str {
    match reply.find(OBSERVATION_STOP) {
        Some(pos) => &reply[..pos],
        None => reply,
    }
}
