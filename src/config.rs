//! Environment-driven configuration.
//!
//! `.env` files are honored via `dotenvy`; unset values fall back to
//! defaults. The agent API key is optional by design: without it the chatbot
//! surface disables itself instead of failing per message.

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_AGENT_MODEL: &str = "gemini-2.5-flash";

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_usize_env(key: &str, default: usize) -> Result<usize, ConfigError> {
    match optional_env(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a valid count"),
        }),
        None => Ok(default),
    }
}

/// Conversational-agent settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Credential for the external agent; `None` disables the chatbot.
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Upper bound on function-call rounds per user message.
    pub max_tool_rounds: usize,
}

impl AgentConfig {
    pub fn available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
}

impl AppConfig {
    /// Read configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_key = optional_env("GEMINI_API_KEY").map(SecretString::from);
        if api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set, chatbot will be disabled");
        }

        Ok(Self {
            agent: AgentConfig {
                api_key,
                model: optional_env("AGENT_MODEL")
                    .unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_string()),
                max_tool_rounds: parse_usize_env("AGENT_MAX_TOOL_ROUNDS", 8)?,
            },
        })
    }
}
