//! Speech Provider Port - speech-to-text and text-to-speech.
//!
//! Only the request/response shapes the handlers rely on are modelled here.
//! Token usage is reported as a single count per call.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Stream of synthesized audio events.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<AudioEvent, SpeechError>> + Send>>;

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Transcribes the audio reachable at `audio_url`.
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription, SpeechError>;

    /// Synthesizes `text` and returns where the audio can be fetched.
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Synthesis, SpeechError>;

    /// Synthesizes `text`, yielding audio chunks as the provider produces them.
    async fn synthesize_stream(&self, request: SynthesisRequest) -> Result<AudioStream, SpeechError>;

    /// Fetches synthesized audio, forwarding an optional `Range` header.
    async fn fetch_audio(&self, url: &str, range: Option<&str>) -> Result<FetchedAudio, SpeechError>;
}

/// Result of a transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub tokens: u64,
}

/// Text-to-speech request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Overrides the configured voice.
    pub voice: Option<String>,
    pub language: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            language: None,
        }
    }
}

/// Result of a synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub audio_url: String,
    pub tokens: u64,
}

/// One event of a streaming synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// Decoded audio bytes.
    Audio(Vec<u8>),
    /// Usage reported by the provider.
    Usage(u64),
}

/// Proxied audio body and the headers to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    /// Upstream status (200 or 206).
    pub status: u16,
    pub content_range: Option<String>,
    pub content_length: Option<u64>,
    pub bytes: Vec<u8>,
}

/// Speech provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeechError {
    /// Missing key, endpoint, model or voice.
    #[error("speech provider not configured: {0}")]
    NotConfigured(String),

    /// Transport failure, non-2xx status or error code in the body.
    #[error("speech request failed: {0}")]
    Upstream(String),

    /// The response carried no usable result.
    #[error("speech provider returned an empty result")]
    EmptyResponse,

    /// Streaming ended with an unexpected finish reason.
    #[error("speech stream finished abnormally: {0}")]
    AbnormalFinish(String),
}

impl SpeechError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn not_configured(what: impl Into<String>) -> Self {
        Self::NotConfigured(what.into())
    }
}
