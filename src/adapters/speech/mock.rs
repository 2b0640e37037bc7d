//! Mock speech provider for testing.

use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ports::{
    AudioEvent, AudioStream, FetchedAudio, SpeechError, SpeechProvider, Synthesis,
    SynthesisRequest, Transcription,
};

#[derive(Debug)]
struct Script {
    transcription: Result<Transcription, SpeechError>,
    synthesis: Result<Synthesis, SpeechError>,
    stream: Result<Vec<Result<AudioEvent, SpeechError>>, SpeechError>,
    audio: FetchedAudio,
    transcribed_urls: Vec<String>,
    synthesized: Vec<SynthesisRequest>,
    fetched_ranges: Vec<Option<String>>,
}

/// Mock speech provider with fixed results and call recording.
#[derive(Debug, Clone)]
pub struct MockSpeechProvider {
    script: Arc<Mutex<Script>>,
}

impl Default for MockSpeechProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpeechProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                transcription: Ok(Transcription {
                    text: "mock transcript".to_string(),
                    tokens: 5,
                }),
                synthesis: Ok(Synthesis {
                    audio_url: "https://audio.example.com/a.wav".to_string(),
                    tokens: 8,
                }),
                stream: Ok(vec![
                    Ok(AudioEvent::Audio(b"RIFF".to_vec())),
                    Ok(AudioEvent::Usage(8)),
                ]),
                audio: FetchedAudio {
                    status: 200,
                    content_range: None,
                    content_length: Some(4),
                    bytes: b"RIFF".to_vec(),
                },
                transcribed_urls: Vec::new(),
                synthesized: Vec::new(),
                fetched_ranges: Vec::new(),
            })),
        }
    }

    /// A provider whose every call reports missing configuration.
    pub fn unconfigured() -> Self {
        let mock = Self::new();
        {
            let mut script = mock.lock();
            let err = SpeechError::not_configured("api key");
            script.transcription = Err(err.clone());
            script.synthesis = Err(err.clone());
            script.stream = Err(err);
        }
        mock
    }

    pub fn with_transcription(self, result: Result<Transcription, SpeechError>) -> Self {
        self.lock().transcription = result;
        self
    }

    pub fn with_synthesis(self, result: Result<Synthesis, SpeechError>) -> Self {
        self.lock().synthesis = result;
        self
    }

    pub fn with_stream(self, result: Result<Vec<Result<AudioEvent, SpeechError>>, SpeechError>) -> Self {
        self.lock().stream = result;
        self
    }

    pub fn with_audio(self, audio: FetchedAudio) -> Self {
        self.lock().audio = audio;
        self
    }

    pub fn transcribed_urls(&self) -> Vec<String> {
        self.lock().transcribed_urls.clone()
    }

    pub fn synthesized(&self) -> Vec<SynthesisRequest> {
        self.lock().synthesized.clone()
    }

    pub fn fetched_ranges(&self) -> Vec<Option<String>> {
        self.lock().fetched_ranges.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription, SpeechError> {
        let mut script = self.lock();
        script.transcribed_urls.push(audio_url.to_string());
        script.transcription.clone()
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<Synthesis, SpeechError> {
        let mut script = self.lock();
        script.synthesized.push(request);
        script.synthesis.clone()
    }

    async fn synthesize_stream(&self, request: SynthesisRequest) -> Result<AudioStream, SpeechError> {
        let events = {
            let mut script = self.lock();
            script.synthesized.push(request);
            script.stream.clone()
        }?;
        Ok(Box::pin(stream::iter(events)))
    }

    async fn fetch_audio(&self, _url: &str, range: Option<&str>) -> Result<FetchedAudio, SpeechError> {
        let mut script = self.lock();
        script.fetched_ranges.push(range.map(str::to_string));
        Ok(script.audio.clone())
    }
}
