//! Attachment upload and speech handlers.

mod speech_to_text;
mod text_to_speech;
mod upload_attachment;

pub use speech_to_text::{SpeechToTextCommand, SpeechToTextHandler};
pub use text_to_speech::{
    AudioChunks, TextToSpeechCommand, TextToSpeechHandler, TextToSpeechStreamHandler,
};
pub use upload_attachment::{UploadAttachmentCommand, UploadAttachmentHandler};

use uuid::Uuid;

/// Builds object keys for uploaded blobs under a configured prefix.
#[derive(Debug, Clone, Default)]
pub struct ObjectKeys {
    prefix: String,
}

impl ObjectKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `{prefix}/{name}` without doubled slashes.
    pub fn key(&self, name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    /// Key for audio submitted for transcription.
    pub fn speech_key(&self, name: &str) -> String {
        self.key(&format!("stt/{}", name))
    }
}

/// `{uuid}_{basename}`; any directory part of the client name is dropped.
pub(crate) fn unique_name(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.');
    let base = if base.is_empty() { "upload" } else { base };
    format!("{}_{}", Uuid::new_v4().simple(), base)
}
