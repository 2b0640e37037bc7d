//! SpeechToTextHandler - Transcribes an uploaded audio clip.
//!
//! The provider fetches audio by URL, so object storage is mandatory here.

use std::sync::Arc;

use super::{unique_name, ObjectKeys};
use crate::application::{check_quota, AttachmentResolver, EngineError};
use crate::domain::conversation::DEFAULT_MIME_TYPE;
use crate::domain::foundation::UserId;
use crate::ports::{QuotaLedger, SpeechProvider, Transcription};

#[derive(Debug, Clone)]
pub struct SpeechToTextCommand {
    pub user_id: UserId,
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct SpeechToTextHandler {
    quota: Arc<dyn QuotaLedger>,
    resolver: AttachmentResolver,
    speech: Arc<dyn SpeechProvider>,
    keys: ObjectKeys,
}

impl SpeechToTextHandler {
    pub fn new(
        quota: Arc<dyn QuotaLedger>,
        resolver: AttachmentResolver,
        speech: Arc<dyn SpeechProvider>,
        keys: ObjectKeys,
    ) -> Self {
        Self {
            quota,
            resolver,
            speech,
            keys,
        }
    }

    pub async fn handle(&self, cmd: SpeechToTextCommand) -> Result<Transcription, EngineError> {
        check_quota(self.quota.as_ref(), cmd.user_id).await?;
        if cmd.bytes.is_empty() {
            return Err(EngineError::invalid("audio file is empty"));
        }
        let storage = self.resolver.storage();
        if !storage.is_enabled() {
            return Err(EngineError::StorageNotReady);
        }

        let key = self.keys.speech_key(&unique_name(&cmd.filename));
        let mime = cmd
            .mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        storage.put(&key, cmd.bytes, mime).await?;
        let url = self.resolver.presign(&key).await?;

        let transcription = self.speech.transcribe(&url).await?;
        self.quota.increase_used(cmd.user_id, transcription.tokens).await?;

        tracing::info!(user_id = %cmd.user_id, tokens = transcription.tokens, "Audio transcribed");
        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryStore;
    use crate::adapters::speech::MockSpeechProvider;
    use crate::adapters::storage::{InMemoryObjectStorage, NoObjectStorage};
    use std::time::Duration;

    fn command() -> SpeechToTextCommand {
        SpeechToTextCommand {
            user_id: UserId::new(1),
            filename: "voice.wav".to_string(),
            mime_type: Some("audio/wav".to_string()),
            bytes: b"RIFF".to_vec(),
        }
    }

    #[tokio::test]
    async fn uploads_transcribes_and_meters_usage() {
        let store = Arc::new(InMemoryStore::new().with_user(UserId::new(1), "a", 100, 10));
        let objects = Arc::new(InMemoryObjectStorage::new(Duration::from_secs(3600)));
        let speech = MockSpeechProvider::new();
        let handler = SpeechToTextHandler::new(
            store.clone(),
            AttachmentResolver::new(objects.clone(), Duration::from_secs(60)),
            Arc::new(speech.clone()),
            ObjectKeys::new("chat"),
        );

        let transcription = handler.handle(command()).await.unwrap();

        assert_eq!(transcription.text, "mock transcript");
        assert_eq!(store.quota_of(UserId::new(1)).unwrap().used, 15);
        let urls = speech.transcribed_urls();
        assert_eq!(objects.fetch(&urls[0]).unwrap(), b"RIFF".to_vec());
        assert!(objects.keys().iter().all(|k| k.starts_with("chat/stt/")));
    }

    #[tokio::test]
    async fn requires_object_storage() {
        let store = Arc::new(InMemoryStore::new().with_user(UserId::new(1), "a", 100, 0));
        let speech = MockSpeechProvider::new();
        let handler = SpeechToTextHandler::new(
            store,
            AttachmentResolver::new(Arc::new(NoObjectStorage), Duration::from_secs(60)),
            Arc::new(speech.clone()),
            ObjectKeys::default(),
        );

        assert_eq!(handler.handle(command()).await.unwrap_err(), EngineError::StorageNotReady);
        assert!(speech.transcribed_urls().is_empty());
    }

    #[tokio::test]
    async fn exhausted_quota_is_checked_first() {
        let store = Arc::new(InMemoryStore::new().with_user(UserId::new(1), "a", 100, 100));
        let handler = SpeechToTextHandler::new(
            store,
            AttachmentResolver::new(Arc::new(NoObjectStorage), Duration::from_secs(60)),
            Arc::new(MockSpeechProvider::new()),
            ObjectKeys::default(),
        );

        assert_eq!(handler.handle(command()).await.unwrap_err(), EngineError::QuotaExceeded);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_not_ready() {
        let store = Arc::new(InMemoryStore::new().with_user(UserId::new(1), "a", 100, 0));
        let handler = SpeechToTextHandler::new(
            store.clone(),
            AttachmentResolver::new(
                Arc::new(InMemoryObjectStorage::new(Duration::from_secs(60))),
                Duration::from_secs(60),
            ),
            Arc::new(MockSpeechProvider::unconfigured()),
            ObjectKeys::default(),
        );

        assert_eq!(
            handler.handle(command()).await.unwrap_err(),
            EngineError::SpeechProviderNotReady
        );
        assert_eq!(store.quota_of(UserId::new(1)).unwrap().used, 0);
    }
}
