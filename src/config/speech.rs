//! Speech provider configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const DEFAULT_STT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation";
const DEFAULT_STT_MODEL: &str = "qwen-audio-asr";

/// Speech-to-text and text-to-speech configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    pub api_key: Option<Secret<String>>,

    #[serde(default)]
    pub stt: SttConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    /// Client timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Speech recognition endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
}

/// Speech synthesis endpoint; all three values are required to synthesize
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TtsConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub voice: String,
}

impl SpeechConfig {
    /// API key, if a non-empty one is configured
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate speech configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stt_endpoint(),
            model: default_stt_model(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_stt_endpoint() -> String {
    DEFAULT_STT_ENDPOINT.to_string()
}

fn default_stt_model() -> String {
    DEFAULT_STT_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_hosted_asr() {
        let config = SpeechConfig::default();
        assert_eq!(config.stt.model, "qwen-audio-asr");
        assert!(config.stt.endpoint.ends_with("/multimodal-generation/generation"));
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn unbounded_timeout_is_rejected() {
        let config = SpeechConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }
}
