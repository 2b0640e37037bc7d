//! DashScope speech provider.
//!
//! Recognition posts the audio URL as a single user message to the
//! multimodal generation endpoint. Synthesis posts `{model, input:{text,
//! voice, language_type}}`; the streaming variant adds `X-DashScope-SSE`
//! and receives base64 audio in `data:` lines.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderName, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::adapters::ai::lines_from_bytes;
use crate::config::SpeechConfig;
use crate::ports::{
    AudioEvent, AudioStream, FetchedAudio, SpeechError, SpeechProvider, Synthesis,
    SynthesisRequest, Transcription,
};

/// Language sent when the caller gives none.
pub const DEFAULT_LANGUAGE: &str = "Auto";

const SSE_HEADER: &str = "X-DashScope-SSE";
const FAILED: &str = "speech request failed";

/// DashScope-backed speech provider.
pub struct DashscopeSpeechProvider {
    config: SpeechConfig,
    client: Client,
}

impl DashscopeSpeechProvider {
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SpeechError::upstream(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, SpeechError> {
        self.config
            .api_key()
            .ok_or_else(|| SpeechError::not_configured("api key"))
    }

    /// Resolves endpoint, model and voice for a synthesis call.
    fn tts_body(&self, request: &SynthesisRequest) -> Result<(&str, TtsRequest), SpeechError> {
        let tts = &self.config.tts;
        if tts.endpoint.is_empty() || tts.model.is_empty() {
            return Err(SpeechError::not_configured("tts endpoint or model"));
        }
        let voice = request
            .voice
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(&tts.voice);
        if voice.is_empty() {
            return Err(SpeechError::not_configured("tts voice"));
        }
        let language = request
            .language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);

        Ok((
            tts.endpoint.as_str(),
            TtsRequest {
                model: tts.model.clone(),
                input: TtsInput {
                    text: request.text.clone(),
                    voice: voice.to_string(),
                    language_type: language.to_string(),
                },
            },
        ))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, SpeechError> {
        builder
            .send()
            .await
            .map_err(|e| SpeechError::upstream(e.to_string()))
    }
}

#[async_trait]
impl SpeechProvider for DashscopeSpeechProvider {
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription, SpeechError> {
        let api_key = self.api_key()?;
        let body = SttRequest::for_audio(&self.config.stt.model, audio_url);

        let response = Self::send(
            self.client
                .post(&self.config.stt.endpoint)
                .bearer_auth(api_key)
                .json(&body),
        )
        .await?;
        let status = response.status();
        let result: SttResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::upstream(format!("Failed to parse response: {}", e)))?;

        if !status.is_success() {
            return Err(SpeechError::upstream(result.message.unwrap_or_else(|| FAILED.to_string())));
        }
        Ok(result.into_transcription())
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<Synthesis, SpeechError> {
        let api_key = self.api_key()?;
        let (endpoint, body) = self.tts_body(&request)?;

        let response = Self::send(self.client.post(endpoint).bearer_auth(api_key).json(&body)).await?;
        let status = response.status();
        let result: TtsResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::upstream(format!("Failed to parse response: {}", e)))?;

        if !status.is_success() {
            return Err(SpeechError::upstream(result.message.unwrap_or_else(|| FAILED.to_string())));
        }
        result.check_code()?;

        let audio_url = result.output.audio.url.unwrap_or_default();
        if audio_url.is_empty() {
            return Err(SpeechError::EmptyResponse);
        }
        Ok(Synthesis {
            audio_url,
            tokens: result.usage.billable(),
        })
    }

    async fn synthesize_stream(&self, request: SynthesisRequest) -> Result<AudioStream, SpeechError> {
        let api_key = self.api_key()?;
        let (endpoint, body) = self.tts_body(&request)?;

        let response = Self::send(
            self.client
                .post(endpoint)
                .bearer_auth(api_key)
                .header(SSE_HEADER, "enable")
                .json(&body),
        )
        .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::upstream(format!("{}: {}", FAILED, body)));
        }

        struct Relay {
            lines: crate::ports::UpstreamLines,
            decoder: TtsStreamDecoder,
            ready: VecDeque<AudioEvent>,
            failed: bool,
        }

        let relay = Relay {
            lines: lines_from_bytes(response.bytes_stream()),
            decoder: TtsStreamDecoder::default(),
            ready: VecDeque::new(),
            failed: false,
        };

        Ok(Box::pin(stream::unfold(relay, |mut r| async move {
            loop {
                if let Some(event) = r.ready.pop_front() {
                    return Some((Ok(event), r));
                }
                if r.failed || r.decoder.is_finished() {
                    return None;
                }
                match r.lines.next().await {
                    Some(Ok(line)) => match r.decoder.feed(&line) {
                        Ok(events) => r.ready.extend(events),
                        Err(e) => {
                            r.failed = true;
                            return Some((Err(e), r));
                        }
                    },
                    Some(Err(e)) => {
                        r.failed = true;
                        return Some((Err(SpeechError::upstream(e.to_string())), r));
                    }
                    None => return None,
                }
            }
        })))
    }

    async fn fetch_audio(&self, url: &str, range: Option<&str>) -> Result<FetchedAudio, SpeechError> {
        let mut builder = self.client.get(url);
        if let Some(range) = range.filter(|r| !r.is_empty()) {
            builder = builder.header(RANGE, range);
        }
        let response = Self::send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::upstream(format!("audio fetch returned {}", status)));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_range = header(CONTENT_RANGE);
        let content_length = header(CONTENT_LENGTH).and_then(|v| v.parse().ok());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::upstream(e.to_string()))?;

        Ok(FetchedAudio {
            status: status.as_u16(),
            content_range,
            content_length,
            bytes: bytes.to_vec(),
        })
    }
}

/// Incremental decoder for the synthesis event stream.
///
/// Feed it raw lines; it yields audio and usage events and records when the
/// provider has finished.
#[derive(Debug, Default)]
pub struct TtsStreamDecoder {
    finished: bool,
}

impl TtsStreamDecoder {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decodes one line.
    ///
    /// # Errors
    ///
    /// - `Upstream` for an error code, bad JSON or bad base64
    /// - `AbnormalFinish` for a finish reason other than `stop`
    pub fn feed(&mut self, line: &str) -> Result<Vec<AudioEvent>, SpeechError> {
        let Some(payload) = line.trim().strip_prefix("data:").map(str::trim) else {
            return Ok(Vec::new());
        };
        if payload == "[DONE]" {
            self.finished = true;
            return Ok(Vec::new());
        }

        let event: TtsResponse = serde_json::from_str(payload)
            .map_err(|e| SpeechError::upstream(format!("Failed to parse event: {}", e)))?;
        event.check_code()?;

        let mut events = Vec::new();
        if let Some(data) = event.output.audio.data.as_deref().filter(|d| !d.is_empty()) {
            let chunk = BASE64
                .decode(data)
                .map_err(|e| SpeechError::upstream(format!("Invalid audio payload: {}", e)))?;
            if !chunk.is_empty() {
                events.push(AudioEvent::Audio(chunk));
            }
        }
        let tokens = event.usage.billable();
        if tokens > 0 {
            events.push(AudioEvent::Usage(tokens));
        }

        match event.output.finish_reason.as_deref() {
            None | Some("") | Some("null") => {}
            Some("stop") => self.finished = true,
            Some(other) => return Err(SpeechError::AbnormalFinish(other.to_string())),
        }
        Ok(events)
    }
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct SttRequest {
    model: String,
    input: SttInput,
}

#[derive(Debug, Serialize)]
struct SttInput {
    messages: Vec<SttMessage>,
}

#[derive(Debug, Serialize)]
struct SttMessage {
    role: &'static str,
    content: Vec<SttAudio>,
}

#[derive(Debug, Serialize)]
struct SttAudio {
    audio: String,
}

impl SttRequest {
    fn for_audio(model: &str, audio_url: &str) -> Self {
        Self {
            model: model.to_string(),
            input: SttInput {
                messages: vec![SttMessage {
                    role: "user",
                    content: vec![SttAudio {
                        audio: audio_url.to_string(),
                    }],
                }],
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SttResponse {
    message: Option<String>,
    #[serde(default)]
    output: SttOutput,
    #[serde(default)]
    usage: SttUsage,
}

#[derive(Debug, Default, Deserialize)]
struct SttOutput {
    #[serde(default)]
    choices: Vec<SttChoice>,
}

#[derive(Debug, Deserialize)]
struct SttChoice {
    message: SttReply,
}

#[derive(Debug, Deserialize)]
struct SttReply {
    #[serde(default)]
    content: Vec<SttText>,
}

#[derive(Debug, Deserialize)]
struct SttText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct SttUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    audio_tokens: u64,
}

impl SttResponse {
    fn into_transcription(self) -> Transcription {
        let text = self
            .output
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content.into_iter().next())
            .map(|t| t.text)
            .unwrap_or_default();
        let u = self.usage;
        Transcription {
            text,
            tokens: u.input_tokens + u.output_tokens + u.audio_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest {
    model: String,
    input: TtsInput,
}

#[derive(Debug, Serialize)]
struct TtsInput {
    text: String,
    voice: String,
    language_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct TtsResponse {
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    output: TtsOutput,
    #[serde(default)]
    usage: TtsUsage,
}

#[derive(Debug, Default, Deserialize)]
struct TtsOutput {
    finish_reason: Option<String>,
    #[serde(default)]
    audio: TtsAudio,
}

#[derive(Debug, Default, Deserialize)]
struct TtsAudio {
    data: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TtsUsage {
    #[serde(default)]
    characters: u64,
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl TtsUsage {
    /// Reported total, else input + output, else characters.
    fn billable(&self) -> u64 {
        if self.total_tokens > 0 {
            return self.total_tokens;
        }
        let split = self.input_tokens + self.output_tokens;
        if split > 0 {
            split
        } else {
            self.characters
        }
    }
}

impl TtsResponse {
    fn check_code(&self) -> Result<(), SpeechError> {
        match self.code.as_deref().filter(|c| !c.is_empty()) {
            Some(_) => Err(SpeechError::upstream(
                self.message.clone().unwrap_or_else(|| FAILED.to_string()),
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TtsConfig;
    use secrecy::Secret;
    use serde_json::json;

    fn configured() -> SpeechConfig {
        SpeechConfig {
            api_key: Some(Secret::new("sk-test".to_string())),
            tts: TtsConfig {
                endpoint: "https://tts.example.com/synth".to_string(),
                model: "tts-model".to_string(),
                voice: "Cherry".to_string(),
            },
            ..Default::default()
        }
    }

    fn provider(config: SpeechConfig) -> DashscopeSpeechProvider {
        DashscopeSpeechProvider::new(config).unwrap()
    }

    mod readiness {
        use super::*;

        #[tokio::test]
        async fn missing_api_key_is_not_configured() {
            let provider = provider(SpeechConfig::default());
            assert!(matches!(
                provider.transcribe("https://x/a.wav").await,
                Err(SpeechError::NotConfigured(_))
            ));
            assert!(matches!(
                provider.synthesize(SynthesisRequest::new("hi")).await,
                Err(SpeechError::NotConfigured(_))
            ));
        }

        #[test]
        fn missing_voice_is_not_configured() {
            let mut config = configured();
            config.tts.voice = String::new();
            let provider = provider(config);
            assert!(matches!(
                provider.tts_body(&SynthesisRequest::new("hi")),
                Err(SpeechError::NotConfigured(_))
            ));
        }

        #[test]
        fn request_voice_overrides_configured_voice() {
            let provider = provider(configured());
            let request = SynthesisRequest {
                voice: Some("Ethan".to_string()),
                ..SynthesisRequest::new("hi")
            };
            let (_, body) = provider.tts_body(&request).unwrap();
            assert_eq!(body.input.voice, "Ethan");
        }
    }

    mod wire_format {
        use super::*;

        #[test]
        fn synthesis_body_defaults_language() {
            let provider = provider(configured());
            let (endpoint, body) = provider.tts_body(&SynthesisRequest::new("hello")).unwrap();
            assert_eq!(endpoint, "https://tts.example.com/synth");
            assert_eq!(
                serde_json::to_value(&body).unwrap(),
                json!({
                    "model": "tts-model",
                    "input": {"text": "hello", "voice": "Cherry", "language_type": "Auto"}
                })
            );
        }

        #[test]
        fn recognition_body_wraps_audio_url() {
            let body = SttRequest::for_audio("qwen-audio-asr", "https://x/a.wav");
            assert_eq!(
                serde_json::to_value(&body).unwrap(),
                json!({
                    "model": "qwen-audio-asr",
                    "input": {"messages": [{"role": "user", "content": [{"audio": "https://x/a.wav"}]}]}
                })
            );
        }

        #[test]
        fn recognition_usage_sums_all_counters() {
            let response: SttResponse = serde_json::from_value(json!({
                "output": {"choices": [{"message": {"content": [{"text": "hello world"}]}}]},
                "usage": {"input_tokens": 3, "output_tokens": 4, "audio_tokens": 5}
            }))
            .unwrap();
            assert_eq!(
                response.into_transcription(),
                Transcription {
                    text: "hello world".to_string(),
                    tokens: 12
                }
            );
        }

        #[test]
        fn recognition_without_choices_is_empty_text() {
            let response: SttResponse = serde_json::from_value(json!({})).unwrap();
            assert_eq!(response.into_transcription().text, "");
        }

        #[test]
        fn synthesis_usage_fallbacks() {
            let usage = |v| serde_json::from_value::<TtsUsage>(v).unwrap().billable();
            assert_eq!(usage(json!({"total_tokens": 9, "input_tokens": 1})), 9);
            assert_eq!(usage(json!({"input_tokens": 2, "output_tokens": 3})), 5);
            assert_eq!(usage(json!({"characters": 11})), 11);
            assert_eq!(usage(json!({})), 0);
        }
    }

    mod stream_decoding {
        use super::*;

        fn audio_line(bytes: &[u8], finish: &str) -> String {
            format!(
                r#"data: {{"output":{{"finish_reason":"{}","audio":{{"data":"{}"}}}},"usage":{{"characters":4}}}}"#,
                finish,
                BASE64.encode(bytes)
            )
        }

        #[test]
        fn decodes_audio_and_usage_until_stop() {
            let mut decoder = TtsStreamDecoder::default();

            let events = decoder.feed(&audio_line(b"abc", "null")).unwrap();
            assert_eq!(events, vec![AudioEvent::Audio(b"abc".to_vec()), AudioEvent::Usage(4)]);
            assert!(!decoder.is_finished());

            decoder.feed(&audio_line(b"d", "stop")).unwrap();
            assert!(decoder.is_finished());
        }

        #[test]
        fn ignores_non_data_lines() {
            let mut decoder = TtsStreamDecoder::default();
            assert!(decoder.feed("").unwrap().is_empty());
            assert!(decoder.feed("id: 1").unwrap().is_empty());
            assert!(decoder.feed("event: result").unwrap().is_empty());
        }

        #[test]
        fn done_sentinel_finishes() {
            let mut decoder = TtsStreamDecoder::default();
            decoder.feed("data: [DONE]").unwrap();
            assert!(decoder.is_finished());
        }

        #[test]
        fn unexpected_finish_reason_is_abnormal() {
            let mut decoder = TtsStreamDecoder::default();
            assert_eq!(
                decoder.feed(&audio_line(b"x", "length")).unwrap_err(),
                SpeechError::AbnormalFinish("length".to_string())
            );
        }

        #[test]
        fn error_code_is_upstream_failure() {
            let mut decoder = TtsStreamDecoder::default();
            let err = decoder
                .feed(r#"data: {"code":"Throttling","message":"slow down"}"#)
                .unwrap_err();
            assert_eq!(err, SpeechError::Upstream("slow down".to_string()));
        }

        #[test]
        fn bad_base64_is_upstream_failure() {
            let mut decoder = TtsStreamDecoder::default();
            let err = decoder
                .feed(r#"data: {"output":{"finish_reason":"null","audio":{"data":"@@@"}}}"#)
                .unwrap_err();
            assert!(matches!(err, SpeechError::Upstream(_)));
        }
    }
}
