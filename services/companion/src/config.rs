//! services/companion/src/config.rs
//!
//! Defines the service configuration and how it is read from the environment.
//!
//! Every setting has a default except the API key, which may be absent: the
//! features that need it report the missing credential when they are used.

use std::net::SocketAddr;
use study_companion_core::DeepReasoningPolicy;
use tracing::Level;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub api_key: Option<String>,
    pub api_base: String,
    pub chat_model: String,
    pub deep_chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub image_model: String,
    pub deep_reasoning: DeepReasoningPolicy,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the current directory is honoured outside of tests.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and local store ---
        let bind_address_str = var("BIND_ADDRESS", "127.0.0.1:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL", "sqlite://study_companion.db?mode=rwc");
        if database_url.trim().is_empty() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Hosted model API ---
        let api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        let deep_reasoning = var("DEEP_REASONING", "user")
            .parse::<DeepReasoningPolicy>()
            .map_err(|e| ConfigError::InvalidValue("DEEP_REASONING".to_string(), e))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            api_key,
            api_base: var("GEMINI_API_BASE", DEFAULT_API_BASE),
            chat_model: var("CHAT_MODEL", "gemini-3-flash-preview"),
            deep_chat_model: var("DEEP_CHAT_MODEL", "gemini-3-pro-preview"),
            tts_model: var("TTS_MODEL", "gemini-2.5-flash-preview-tts"),
            tts_voice: var("TTS_VOICE", "nova"),
            image_model: var("IMAGE_MODEL", "imagen-3.0-generate-002"),
            deep_reasoning,
            allowed_origin: var("ALLOWED_ORIGIN", "http://localhost:5173"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:3000");
        assert!(config.database_url.starts_with("sqlite://"));
        assert!(config.api_key.is_none());
        assert_eq!(config.deep_reasoning, DeepReasoningPolicy::User);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = config(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("BIND_ADDRESS", "nowhere")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "BIND_ADDRESS"
        ));
        assert!(matches!(
            config(&[("DEEP_REASONING", "sometimes")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "DEEP_REASONING"
        ));
    }
}
