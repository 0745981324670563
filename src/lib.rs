pub mod agent;
pub mod config;
pub mod crew;
pub mod llm;
pub mod task;
pub mod tools;

pub use agent::{Agent, AgentCapabilities, AgentHandle, AgentRegistry, AgentRole, AgentSpec};
pub use crew::{ConfigError, Crew, CrewBuilder, CrewError, CrewOutput, Process, UsageMetrics};
pub use llm::{CompletionService, LlmConfig, Provider, RateLimiter};
pub use task::{FailureReason, Task, TaskOutput, TaskSpec, TaskStatus, TemplatedText};
pub use tools::{Tool, ToolError, ToolInput, ToolRegistry};
