//! Application Configuration Module
//!
//! Loads the mentor service settings from environment variables (and a `.env`
//! file during local development) into a single struct that is passed to the
//! parts of the service that need it.

use mentor_core::DEFAULT_SAVE_INTERVAL;
use secrecy::SecretString;
use std::env;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// Number of samples per audio frame streamed to the provider (100 ms at 24 kHz).
pub const INPUT_CHUNK_SIZE: usize = 2400;
/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";
/// Default model for transcribing the user's speech.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub realtime_model: String,
    pub transcription_model: String,
    pub history_api_url: String,
    pub history_api_token: Option<SecretString>,
    pub save_interval: Duration,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `OPENAI_API_KEY`: Secret key for the OpenAI Realtime API. Required.
    // *   `REALTIME_MODEL`: (Optional) Realtime model. Defaults to `gpt-4o-realtime-preview-2024-10-01`.
    // *   `TRANSCRIPTION_MODEL`: (Optional) Input transcription model. Defaults to `whisper-1`.
    // *   `HISTORY_API_URL`: Base URL of the history/usage backend. Required.
    // *   `HISTORY_API_TOKEN`: (Optional) Bearer token for the backend.
    // *   `SAVE_INTERVAL_SECS`: (Optional) Autosave period in seconds. Defaults to 30.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
        };

        let openai_api_key = SecretString::from(required("OPENAI_API_KEY")?);
        let history_api_url = required("HISTORY_API_URL")?
            .trim_end_matches('/')
            .to_string();
        if !history_api_url.starts_with("http://") && !history_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                name: "HISTORY_API_URL".to_string(),
                value: history_api_url,
            });
        }
        let history_api_token = lookup("HISTORY_API_TOKEN")
            .filter(|token| !token.is_empty())
            .map(SecretString::from);

        let realtime_model =
            lookup("REALTIME_MODEL").unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string());
        let transcription_model = lookup("TRANSCRIPTION_MODEL")
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());

        let save_interval = match lookup("SAVE_INTERVAL_SECS") {
            None => DEFAULT_SAVE_INTERVAL,
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "SAVE_INTERVAL_SECS".to_string(),
                        value,
                    });
                }
            },
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            openai_api_key,
            realtime_model,
            transcription_model,
            history_api_url,
            history_api_token,
            save_interval,
            log_level,
        })
    }
}
