use serde::Deserialize;

use crate::task::output::DelegationKind;
use crate::tools::ToolInput;

pub const DELEGATE_WORK: &str = "Delegate work to coworker";
pub const ASK_QUESTION: &str = "Ask question to coworker";

const FINAL_ANSWER: &str = "Final Answer:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";

/// What an agent asked for in one reply
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    Finish(String),
    UseTool { tool: String, input: ToolInput },
    Delegate(DelegationRequest),
    /// Delegation action whose input could not be understood
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegationRequest {
    pub kind: DelegationKind,
    pub coworker: String,
    pub instruction: String,
    pub context: String,
}

#[derive(Deserialize)]
struct DelegationPayload {
    coworker: String,
    #[serde(alias = "question")]
    task: String,
    #[serde(default)]
    context: String,
}

/// Interpret a ReAct-style reply.
///
/// An `Action:` that appears before any `Final Answer:` wins; a reply with
/// neither marker is taken as the final answer.
pub fn parse_reply(reply: &str) -> AgentAction {
    let action_at = reply.find(ACTION);
    let final_at = reply.find(FINAL_ANSWER);

    match (action_at, final_at) {
        (Some(action), final_at) if final_at.map_or(true, |f| action < f) => parse_action(&reply[action..]),
        (_, Some(f)) => AgentAction::Finish(reply[f + FINAL_ANSWER.len()..].trim().to_string()),
        _ => AgentAction::Finish(reply.trim().to_string()),
    }
}

fn parse_action(block: &str) -> AgentAction {
    let after = &block[ACTION.len()..];
    let (name_line, rest) = after.split_once('\n').unwrap_or((after, ""));
    let tool = name_line.trim().trim_matches('`').to_string();

    let input = match rest.find(ACTION_INPUT) {
        Some(pos) => {
            let raw = &rest[pos + ACTION_INPUT.len()..];
            let raw = raw.split("\nObservation:").next().unwrap_or(raw);
            let raw = raw.split("\nFinal Answer:").next().unwrap_or(raw);
            strip_code_fence(raw.trim())
        }
        None => String::new(),
    };

    let kind = if tool.eq_ignore_ascii_case(DELEGATE_WORK) {
        DelegationKind::Work
    } else if tool.eq_ignore_ascii_case(ASK_QUESTION) {
        DelegationKind::Question
    } else {
        return AgentAction::UseTool { tool, input: ToolInput::parse(&input) };
    };

    match serde_json::from_str::<DelegationPayload>(&input) {
        Ok(payload) => AgentAction::Delegate(DelegationRequest {
            kind,
            coworker: payload.coworker.trim().to_string(),
            instruction: payload.task,
            context: payload.context,
        }),
        Err(e) => AgentAction::Malformed(format!(
            "'{}' expects a JSON object with \"coworker\", \"{}\" and \"context\": {}",
            tool,
            if kind == DelegationKind::Work { "task" } else { "question" },
            e
        )),
    }
}

fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(inner) = trimmed.strip_prefix("```") {
        let inner = inner.trim_start_matches("json");
        return inner.trim_end_matches("```").trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn final_answer_is_extracted() {
        let reply = "Thought: I have what I need.\nFinal Answer: Cap rates near 6%.";
        assert_eq!(parse_reply(reply), AgentAction::Finish("Cap rates near 6%.".to_string()));
    }

    #[test]
    fn unstructured_reply_is_final() {
        assert_eq!(parse_reply("  Just a plain answer. "), AgentAction::Finish("Just a plain answer.".to_string()));
    }

    #[test]
    fn tool_action_with_json_input() {
        let reply = "Thought: check the listing\nAction: read_webpage\nAction Input: {\"url\": \"https://example.com\"}\nObservation: made up";
        assert_eq!(
            parse_reply(reply),
            AgentAction::UseTool {
                tool: "read_webpage".to_string(),
                input: ToolInput::Json(json!({"url": "https://example.com"})),
            }
        );
    }

    #[test]
    fn action_before_final_answer_wins() {
        let reply = "Action: search\nAction Input: anytown rents\nFinal Answer: premature";
        match parse_reply(reply) {
            AgentAction::UseTool { tool, .. } => assert_eq!(tool, "search"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn delegation_actions() {
        let reply = "Action: Delegate work to coworker\nAction Input: ```json\n{\"coworker\": \"Data Analyst\", \"task\": \"Check rents\", \"context\": \"1 Elm St\"}\n```";
        assert_eq!(
            parse_reply(reply),
            AgentAction::Delegate(DelegationRequest {
                kind: DelegationKind::Work,
                coworker: "Data Analyst".to_string(),
                instruction: "Check rents".to_string(),
                context: "1 Elm St".to_string(),
            })
        );

        let reply = "Action: Ask question to coworker\nAction Input: {\"coworker\": \"Real Estate Broker\", \"question\": \"Any off-market deals?\"}";
        match parse_reply(reply) {
            AgentAction::Delegate(req) => {
                assert_eq!(req.kind, DelegationKind::Question);
                assert_eq!(req.instruction, "Any off-market deals?");
                assert!(req.context.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            parse_reply("Action: Delegate work to coworker\nAction Input: do it"),
            AgentAction::Malformed(_)
        ));
    }
}
