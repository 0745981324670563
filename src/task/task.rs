use serde::{Deserialize, Serialize};

use crate::task::template::{TemplateError, TemplatedText};

/// Declaration of a task before the crew binds its inputs
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: Option<String>,
    pub description: TemplatedText,
    pub expected_output: TemplatedText,
    /// Role name of the bound agent
    pub agent: String,
    pub tools: Vec<String>,
    pub async_execution: bool,
    /// Names of earlier tasks whose output this task needs
    pub context: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        description: impl Into<TemplatedText>,
        expected_output: impl Into<TemplatedText>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
            tools: Vec::new(),
            async_execution: false,
            context: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn async_execution(mut self, enabled: bool) -> Self {
        self.async_execution = enabled;
        self
    }

    pub fn with_context<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = tasks.into_iter().map(Into::into).collect();
        self
    }

    /// Render the templated texts into an immutable task
    pub fn build(self, fallback_name: String) -> Result<Task, TemplateError> {
        Ok(Task {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.unwrap_or(fallback_name),
            description: self.description.render()?,
            expected_output: self.expected_output.render()?,
            agent: self.agent,
            tools: self.tools,
            async_execution: self.async_execution,
            context: self.context,
        })
    }
}

/// A unit of work bound to one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Completion hint for the agent; not enforced
    pub expected_output: String,
    pub agent: String,
    pub tools: Vec<String>,
    pub async_execution: bool,
    pub context: Vec<String>,
}

impl Task {
    /// Tools the task may use: its own list, or its agent's when empty
    pub fn usable_tools<'a>(&'a self, agent_tools: &'a [String]) -> &'a [String] {
        if self.tools.is_empty() {
            agent_tools
        } else {
            &self.tools
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_renders_templates_and_defaults_name() {
        let spec = TaskSpec::new(
            TemplatedText::new("Conduct a detailed market analysis for {address}").bind("address", "1 Elm St"),
            "Market trends and insights report",
            "Data Analyst",
        )
        .with_tools(["search"])
        .async_execution(true);

        let task = spec.build("task-2".to_string()).unwrap();
        assert_eq!(task.name, "task-2");
        assert_eq!(task.description, "Conduct a detailed market analysis for 1 Elm St");
        assert!(task.async_execution);
        assert_eq!(task.usable_tools(&["read_webpage".to_string()]), &["search".to_string()]);
    }

    #[test]
    fn usable_tools_fall_back_to_agent() {
        let task = TaskSpec::new("Summarize", "Summary", "Project Manager")
            .named("summary")
            .build("unused".to_string())
            .unwrap();
        let agent_tools = vec!["human".to_string()];
        assert_eq!(task.name, "summary");
        assert_eq!(task.usable_tools(&agent_tools), agent_tools.as_slice());
    }
}
