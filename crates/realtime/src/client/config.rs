use crate::client::consts::{BASE_URL, DEFAULT_MODEL, OPENAI_API_KEY};
use crate::client::error::ClientError;
use secrecy::SecretString;

/// Where and as whom the client connects.
#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl Config {
    /// Default endpoint and model for the given key.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ClientError> {
        match std::env::var(OPENAI_API_KEY) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(SecretString::from(key))),
            _ => Err(ClientError::MissingApiKey),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Websocket URL of the realtime endpoint for the configured model.
    pub fn endpoint(&self) -> String {
        format!("{}/realtime?model={}", self.base_url, self.model)
    }
}
