//! Speech Provider Adapters.
//!
//! - `DashscopeSpeechProvider` - DashScope ASR and TTS over HTTP
//! - `MockSpeechProvider` - Scripted mock for testing

mod dashscope;
mod mock;

pub use dashscope::{DashscopeSpeechProvider, TtsStreamDecoder, DEFAULT_LANGUAGE};
pub use mock::MockSpeechProvider;
