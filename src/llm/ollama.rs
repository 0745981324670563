use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{ChatMessage, CompletionRequest, CompletionResponse, CompletionService, LlmError};

/// Ollama chat completion backend (`POST {base_url}/api/chat`)
pub struct OllamaCompletionService {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaCompletionService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions<'a>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaReplyMessage>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaReplyMessage {
    content: String,
}

fn to_ollama_message(message: &ChatMessage) -> OllamaMessage<'_> {
    OllamaMessage {
        role: message.role.as_str(),
        content: &message.content,
    }
}

#[async_trait]
impl CompletionService for OllamaCompletionService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %request.model, messages = request.messages.len(), "ollama chat request");

        let body = OllamaChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(to_ollama_message).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                stop: &request.stop,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, base_url = %self.base_url, "failed to reach Ollama");
                LlmError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let reply: OllamaChatResponse = response.json().await?;
        let content = reply
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(CompletionResponse {
            content,
            input_tokens: reply.prompt_eval_count,
            output_tokens: reply.eval_count,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
