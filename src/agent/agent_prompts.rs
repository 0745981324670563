use crate::agent::agent::Agent;
use crate::agent::agent_execution::Assignment;
use crate::agent::output_parser::{ASK_QUESTION, DELEGATE_WORK};
use crate::agent::registry::AgentRegistry;
use crate::llm::ChatMessage;
use crate::tools::ToolRegistry;

impl Agent {
    /// Build initial messages for the agent
    pub fn build_initial_messages(
        &self,
        assignment: &Assignment<'_>,
        tools: &ToolRegistry,
        coworkers: Option<&AgentRegistry>,
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.build_system_prompt(assignment.tools, tools, coworkers)),
            ChatMessage::user(self.build_task_prompt(assignment)),
        ]
    }

    /// Build system prompt for the agent
    fn build_system_prompt(
        &self,
        allowed: &[String],
        tools: &ToolRegistry,
        coworkers: Option<&AgentRegistry>,
    ) -> String {
        let mut prompt = format!(
            "You are {}.\n{}\n\nYour personal goal is: {}",
            self.role.name,
            self.role.backstory.trim(),
            self.goal
        );

        let mut action_names: Vec<String> = allowed.to_vec();
        let mut descriptions = tools.describe(allowed);

        if let Some(registry) = coworkers.filter(|_| self.can_delegate()) {
            let names: Vec<&str> = registry.coworkers_of(self.name()).map(|a| a.name()).collect();
            if !names.is_empty() {
                let coworker_list = names.join(", ");
                if !descriptions.is_empty() {
                    descriptions.push('\n');
                }
                descriptions.push_str(&format!(
                    "- {}: Hand a specific piece of work to one of your coworkers ({}). \
                     Input: a JSON object {{\"coworker\": \"<role>\", \"task\": \"<what to do>\", \"context\": \"<everything they need to know>\"}}\n\
                     - {}: Ask one of your coworkers ({}) a question. \
                     Input: a JSON object {{\"coworker\": \"<role>\", \"question\": \"<question>\", \"context\": \"<everything they need to know>\"}}",
                    DELEGATE_WORK, coworker_list, ASK_QUESTION, coworker_list
                ));
                action_names.push(DELEGATE_WORK.to_string());
                action_names.push(ASK_QUESTION.to_string());
            }
        }

        if action_names.is_empty() {
            prompt.push_str(
                "\n\nWhen you have your answer, reply in exactly this format:\n\
                 Thought: I now know the final answer\n\
                 Final Answer: <your complete answer>",
            );
            return prompt;
        }

        prompt.push_str(&format!(
            "\n\nYou ONLY have access to the following tools, and should NEVER make up tools that are not listed here:\n{}\n\n\
             To use a tool, reply in exactly this format:\n\
             Thought: <what you are thinking>\n\
             Action: <one of [{}]>\n\
             Action Input: <the input to the action>\n\n\
             You will then receive an Observation with the result. When you have your answer, reply:\n\
             Thought: I now know the final answer\n\
             Final Answer: <your complete answer>",
            descriptions,
            action_names.join(", ")
        ));
        prompt
    }

    /// Build task-specific prompt
    fn build_task_prompt(&self, assignment: &Assignment<'_>) -> String {
        let mut prompt = format!("Current Task: {}", assignment.description.trim());

        if !assignment.expected_output.is_empty() {
            prompt.push_str(&format!(
                "\n\nThis is the expected criteria for your final answer: {}\n\
                 You MUST return the actual complete content as the final answer, not a summary.",
                assignment.expected_output.trim()
            ));
        }

        if !assignment.context.trim().is_empty() {
            prompt.push_str(&format!(
                "\n\nThis is the context you're working with:\n{}",
                assignment.context.trim()
            ));
        }

        prompt.push_str("\n\nBegin!");
        prompt
    }
}
