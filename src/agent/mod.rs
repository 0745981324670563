pub mod agent;
pub mod role;
pub mod registry;
pub mod agent_execution;
pub mod agent_prompts;
pub mod output_parser;

// Re-export main types for easier access
pub use agent::{Agent, AgentHandle, AgentSpec};
pub use agent_execution::{AgentRun, AgentRuntime, Assignment};
pub use output_parser::{parse_reply, AgentAction, DelegationRequest};
pub use registry::AgentRegistry;
pub use role::*;
