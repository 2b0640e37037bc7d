//! HTTP DTOs for media endpoints.

use serde::Serialize;

use crate::adapters::http::conversation::AttachmentDto;
use crate::ports::Transcription;

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentBody {
    pub attachment: AttachmentDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionDto {
    pub audio_text: String,
    pub audio_tokens: u64,
}

impl From<Transcription> for TranscriptionDto {
    fn from(t: Transcription) -> Self {
        Self {
            audio_text: t.text,
            audio_tokens: t.tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionBody {
    pub result: TranscriptionDto,
}
