use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{CompletionService, LlmError, OllamaCompletionService, OpenAICompletionService};

/// Completion backends supported by property-crew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Ollama local models
    Ollama,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
    /// Any OpenAI-compatible endpoint; `base_url` is required
    #[serde(rename = "openai_compatible")]
    OpenAICompatible,
}

impl Provider {
    /// Default base URL for the provider
    pub fn get_base_url(&self) -> Option<String> {
        match self {
            Provider::Ollama => Some("http://localhost:11434".to_string()),
            Provider::OpenAI => Some("https://api.openai.com/v1".to_string()),
            Provider::OpenAICompatible => None,
        }
    }
}

/// LLM configuration shared by every agent of a crew
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    /// Overrides the provider's default base URL
    pub base_url: Option<String>,
    /// Falls back to `OPENAI_API_KEY` for OpenAI providers
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: "mistral".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 1500,
        }
    }
}

impl LlmConfig {
    pub fn new(provider: Provider, model: String) -> Self {
        Self {
            provider,
            model,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn resolved_base_url(&self) -> Option<String> {
        self.base_url.clone().or_else(|| self.provider.get_base_url())
    }

    /// Build the completion backend described by this configuration
    pub fn build_service(&self) -> Result<Arc<dyn CompletionService>, LlmError> {
        match self.provider {
            Provider::Ollama => {
                let base_url = self.resolved_base_url().unwrap_or_default();
                Ok(Arc::new(OllamaCompletionService::new(base_url)))
            }
            Provider::OpenAI | Provider::OpenAICompatible => {
                let base_url = self.resolved_base_url().ok_or_else(|| {
                    LlmError::Config("openai_compatible provider requires base_url".to_string())
                })?;
                let api_key = self
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok());
                if self.provider == Provider::OpenAI && api_key.is_none() {
                    return Err(LlmError::Config(
                        "openai provider requires api_key or OPENAI_API_KEY".to_string(),
                    ));
                }
                Ok(Arc::new(OpenAICompletionService::new(api_key, Some(base_url))))
            }
        }
    }
}
