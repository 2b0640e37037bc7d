//! Completion provider configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::conversation::PLACEHOLDER_ENDPOINT;

/// Completion provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (`{base_url}/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key for synchronous completions
    pub api_key: Option<Secret<String>>,

    /// Model identifier; required once an API key is set
    #[serde(default)]
    pub model: String,

    /// Endpoint for streaming sends; the placeholder disables streaming
    #[serde(default = "default_stream_endpoint")]
    pub stream_endpoint: String,

    /// Bearer key for the stream endpoint, if it needs one
    pub stream_api_key: Option<Secret<String>>,

    /// Request timeout in seconds (0 disables the timeout)
    #[serde(default)]
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// API key, if a non-empty one is configured
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
    }

    /// Stream endpoint key, if a non-empty one is configured
    pub fn stream_api_key(&self) -> Option<&str> {
        self.stream_api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
    }

    /// True when synchronous completions can be attempted
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some() && !self.model.trim().is_empty()
    }

    /// Request timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Validate completion provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key().is_some() && self.model.trim().is_empty() {
            return Err(ValidationError::MissingRequired("LLM_MODEL"));
        }
        if self.is_configured()
            && !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            return Err(ValidationError::InvalidUrl("llm.base_url"));
        }
        Ok(())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: String::new(),
            stream_endpoint: default_stream_endpoint(),
            stream_api_key: None,
            timeout_secs: 0,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_stream_endpoint() -> String {
    PLACEHOLDER_ENDPOINT.to_string()
}
