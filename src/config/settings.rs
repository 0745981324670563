use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::{LlmConfig, RateLimiter};
use crate::tools::{HumanInputTool, ReadWebpageTool, SearchTool, ToolError, ToolRegistry, DEFAULT_MAX_OUTPUT_CHARS};

/// Prefix of environment overrides, e.g. `PROPCREW__LLM__MODEL=llama3`
pub const ENV_PREFIX: &str = "PROPCREW";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Runtime settings. Every field has a default, so an empty source is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmConfig,
    pub tools: ToolSettings,
    pub run: RunSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Hard cap on the text any tool hands back to an agent
    pub max_output_chars: usize,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub search_results: usize,
    /// Registers the `human` tool, which blocks on operator input
    pub enable_human_input: bool,
    /// Lets `read_webpage` reach loopback and private-network hosts
    pub allow_private_hosts: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            fetch_timeout_secs: 30,
            user_agent: format!("property-crew/{}", env!("CARGO_PKG_VERSION")),
            search_results: 5,
            enable_human_input: false,
            allow_private_hosts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub rate_limit_window_secs: u64,
    /// Address used when none is given
    pub default_address: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            rate_limit_window_secs: 60,
            default_address: "123 Main St, Anytown, USA".to_string(),
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, then apply `PROPCREW__*` environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |key: &str, message: &str| SettingsError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.tools.max_output_chars == 0 {
            return Err(invalid("tools.max_output_chars", "must be greater than zero"));
        }
        if self.tools.fetch_timeout_secs == 0 {
            return Err(invalid("tools.fetch_timeout_secs", "must be greater than zero"));
        }
        if self.run.rate_limit_window_secs == 0 {
            return Err(invalid("run.rate_limit_window_secs", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid("llm.temperature", "must be between 0 and 2"));
        }
        Ok(())
    }

    /// `input` unless it is blank, otherwise the configured default address
    pub fn address_or_default(&self, input: Option<&str>) -> String {
        match input.map(str::trim) {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => self.run.default_address.clone(),
        }
    }

    /// The process-wide limiter, or a dedicated one for a non-standard window
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        let window = Duration::from_secs(self.run.rate_limit_window_secs);
        let global = RateLimiter::global();
        if global.window() == window {
            global
        } else {
            Arc::new(RateLimiter::new(window))
        }
    }

    /// Registry with the built-in tools
    pub fn tool_registry(&self) -> Result<ToolRegistry, ToolError> {
        let timeout = Duration::from_secs(self.tools.fetch_timeout_secs);
        let mut registry = ToolRegistry::new(self.tools.max_output_chars);
        registry.register(Arc::new(
            SearchTool::new(timeout, &self.tools.user_agent, self.tools.search_results)?,
        ))?;
        registry.register(Arc::new(
            ReadWebpageTool::new(timeout, &self.tools.user_agent)?
                .with_max_chars(self.tools.max_output_chars)
                .allow_private_hosts(self.tools.allow_private_hosts),
        ))?;
        if self.tools.enable_human_input {
            registry.register(Arc::new(HumanInputTool::stdin()))?;
        }
        Ok(registry)
    }
}
