//! Engine error taxonomy.
//!
//! Every port error converts into one closed set of kinds. The HTTP
//! boundary and the event stream both read the client-facing code from
//! [`EngineError::err_code`].

use thiserror::Error;

use crate::domain::foundation::ValidationError;
use crate::ports::{CompletionError, SpeechError, StorageError, StoreError};

/// Failures surfaced by the application layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("conversation not found")]
    ConversationNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error("completion provider not ready")]
    ProviderNotReady,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("completion provider returned an empty response")]
    EmptyResponse,

    #[error("stream finished abnormally: {0}")]
    StreamAbnormalFinish(String),

    #[error("object storage not ready")]
    StorageNotReady,

    #[error("speech provider not ready")]
    SpeechProviderNotReady,

    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Client-facing code; equal to the HTTP status used for this kind.
    pub fn err_code(&self) -> u16 {
        match self {
            EngineError::ConversationNotFound | EngineError::MessageNotFound => 404,
            EngineError::QuotaExceeded => 403,
            EngineError::InvalidRequest(_) => 400,
            EngineError::ProviderNotReady
            | EngineError::StorageNotReady
            | EngineError::SpeechProviderNotReady
            | EngineError::PersistenceFailure(_) => 500,
            EngineError::UpstreamFailure(_)
            | EngineError::EmptyResponse
            | EngineError::StreamAbnormalFinish(_) => 502,
        }
    }

    /// True for the 5xx family.
    pub fn is_server_error(&self) -> bool {
        self.err_code() >= 500
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QuotaExceeded => EngineError::QuotaExceeded,
            StoreError::NotFound(what) => EngineError::PersistenceFailure(format!("{} not found", what)),
            StoreError::Database(message) => EngineError::PersistenceFailure(message),
        }
    }
}

impl From<CompletionError> for EngineError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::NotConfigured => EngineError::ProviderNotReady,
            CompletionError::EmptyResponse => EngineError::EmptyResponse,
            other => EngineError::UpstreamFailure(other.to_string()),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured => EngineError::StorageNotReady,
            other => EngineError::UpstreamFailure(other.to_string()),
        }
    }
}

impl From<SpeechError> for EngineError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NotConfigured(_) => EngineError::SpeechProviderNotReady,
            SpeechError::Upstream(message) => EngineError::UpstreamFailure(message),
            SpeechError::EmptyResponse => EngineError::EmptyResponse,
            SpeechError::AbnormalFinish(reason) => EngineError::StreamAbnormalFinish(reason),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_status_families() {
        assert_eq!(EngineError::ConversationNotFound.err_code(), 404);
        assert_eq!(EngineError::MessageNotFound.err_code(), 404);
        assert_eq!(EngineError::QuotaExceeded.err_code(), 403);
        assert_eq!(EngineError::invalid("x").err_code(), 400);
        assert_eq!(EngineError::ProviderNotReady.err_code(), 500);
        assert_eq!(EngineError::StorageNotReady.err_code(), 500);
        assert_eq!(EngineError::SpeechProviderNotReady.err_code(), 500);
        assert_eq!(EngineError::PersistenceFailure("db".into()).err_code(), 500);
        assert_eq!(EngineError::UpstreamFailure("x".into()).err_code(), 502);
        assert_eq!(EngineError::EmptyResponse.err_code(), 502);
        assert_eq!(EngineError::StreamAbnormalFinish("length".into()).err_code(), 502);
    }

    mod conversions {
        use super::*;

        #[test]
        fn store_errors() {
            assert_eq!(EngineError::from(StoreError::QuotaExceeded), EngineError::QuotaExceeded);
            assert!(matches!(
                EngineError::from(StoreError::database("boom")),
                EngineError::PersistenceFailure(_)
            ));
        }

        #[test]
        fn completion_errors() {
            assert_eq!(
                EngineError::from(CompletionError::NotConfigured),
                EngineError::ProviderNotReady
            );
            assert_eq!(
                EngineError::from(CompletionError::EmptyResponse),
                EngineError::EmptyResponse
            );
            assert_eq!(
                EngineError::from(CompletionError::Status { status: 503, body: "down".into() })
                    .err_code(),
                502
            );
        }

        #[test]
        fn storage_and_speech_errors() {
            assert_eq!(EngineError::from(StorageError::NotConfigured), EngineError::StorageNotReady);
            assert_eq!(
                EngineError::from(SpeechError::not_configured("voice")),
                EngineError::SpeechProviderNotReady
            );
            assert_eq!(
                EngineError::from(SpeechError::AbnormalFinish("length".into())),
                EngineError::StreamAbnormalFinish("length".into())
            );
        }

        #[test]
        fn validation_errors_are_bad_requests() {
            let err = EngineError::from(ValidationError::empty_field("title"));
            assert_eq!(err.err_code(), 400);
        }
    }
}
