//! Text-to-speech handlers for stored turns.
//!
//! Only turns in the caller's own active conversations can be voiced.
//! The buffered form synthesizes, meters and then proxies the audio file;
//! the streaming form yields audio as it is produced and meters once, when
//! the provider finishes.

use futures::{stream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

use crate::application::{check_quota, EngineError};
use crate::domain::conversation::Turn;
use crate::domain::foundation::{MessageId, UserId};
use crate::ports::{
    AudioEvent, AudioStream, FetchedAudio, MessageStore, QuotaLedger, SpeechProvider,
    SynthesisRequest,
};

/// Audio bytes in provider order.
pub type AudioChunks = Pin<Box<dyn Stream<Item = Result<Vec<u8>, EngineError>> + Send>>;

#[derive(Debug, Clone)]
pub struct TextToSpeechCommand {
    pub user_id: UserId,
    pub message_id: MessageId,
    /// Client `Range` header, forwarded when fetching the audio.
    pub range: Option<String>,
}

async fn voiced_turn(
    messages: &dyn MessageStore,
    quota: &dyn QuotaLedger,
    user_id: UserId,
    message_id: MessageId,
) -> Result<Turn, EngineError> {
    let turn = messages
        .find_message(user_id, message_id)
        .await?
        .ok_or(EngineError::MessageNotFound)?;
    check_quota(quota, user_id).await?;
    Ok(turn)
}

pub struct TextToSpeechHandler {
    messages: Arc<dyn MessageStore>,
    quota: Arc<dyn QuotaLedger>,
    speech: Arc<dyn SpeechProvider>,
}

impl TextToSpeechHandler {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        quota: Arc<dyn QuotaLedger>,
        speech: Arc<dyn SpeechProvider>,
    ) -> Self {
        Self {
            messages,
            quota,
            speech,
        }
    }

    pub async fn handle(&self, cmd: TextToSpeechCommand) -> Result<FetchedAudio, EngineError> {
        let turn = voiced_turn(
            self.messages.as_ref(),
            self.quota.as_ref(),
            cmd.user_id,
            cmd.message_id,
        )
        .await?;

        let synthesis = self.speech.synthesize(SynthesisRequest::new(turn.content)).await?;
        self.quota.increase_used(cmd.user_id, synthesis.tokens).await?;
        tracing::info!(message_id = %cmd.message_id, tokens = synthesis.tokens, "Speech synthesized");

        Ok(self
            .speech
            .fetch_audio(&synthesis.audio_url, cmd.range.as_deref())
            .await?)
    }
}

pub struct TextToSpeechStreamHandler {
    messages: Arc<dyn MessageStore>,
    quota: Arc<dyn QuotaLedger>,
    speech: Arc<dyn SpeechProvider>,
}

struct Metered {
    inner: AudioStream,
    quota: Arc<dyn QuotaLedger>,
    user_id: UserId,
    tokens: u64,
}

impl Metered {
    async fn settle(self) {
        if let Err(e) = self.quota.increase_used(self.user_id, self.tokens).await {
            tracing::error!(user_id = %self.user_id, error = %e, "Failed to record speech usage");
        }
    }
}

impl TextToSpeechStreamHandler {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        quota: Arc<dyn QuotaLedger>,
        speech: Arc<dyn SpeechProvider>,
    ) -> Self {
        Self {
            messages,
            quota,
            speech,
        }
    }

    /// Opens the synthesis stream. Failures before the first chunk are
    /// returned directly; later ones end the stream with an error item.
    pub async fn handle(&self, user_id: UserId, message_id: MessageId) -> Result<AudioChunks, EngineError> {
        let turn = voiced_turn(self.messages.as_ref(), self.quota.as_ref(), user_id, message_id).await?;
        let inner = self
            .speech
            .synthesize_stream(SynthesisRequest::new(turn.content))
            .await?;

        let state = Metered {
            inner,
            quota: Arc::clone(&self.quota),
            user_id,
            tokens: 0,
        };
        let chunks = stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            loop {
                match state.inner.next().await {
                    Some(Ok(AudioEvent::Audio(bytes))) => return Some((Ok(bytes), Some(state))),
                    Some(Ok(AudioEvent::Usage(tokens))) => state.tokens = tokens,
                    Some(Err(e)) => return Some((Err(EngineError::from(e)), None)),
                    None => {
                        state.settle().await;
                        return None;
                    }
                }
            }
        });
        Ok(Box::pin(chunks))
    }
}
