//! Completion Provider Port - Interface for the external chat completion service.
//!
//! Two call shapes are supported:
//!
//! - `complete` performs one blocking request and returns the full reply.
//! - `open_stream` opens the incremental event stream and hands back the raw
//!   upstream lines. Decoding those lines is the job of the stream protocol
//!   in the domain layer, so the relay behaves the same for every provider.
//!
//! # Degradation
//!
//! `open_stream` failures that mean "no provider is reachable" (unconfigured
//! endpoint, connection error, non-2xx status) are reported through
//! [`CompletionError::degrades_stream`]; callers substitute the synthetic
//! stream instead of failing the request.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::domain::conversation::{ContextMessage, TokenUsage};
use crate::domain::foundation::ConversationId;

/// Raw upstream lines, without trailing CR/LF.
pub type UpstreamLines = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Port for chat completion.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns true when a synchronous completion can be attempted.
    fn is_ready(&self) -> bool;

    /// Generates a full reply.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` when the client was never initialized
    /// - `EmptyResponse` when the provider returns no choice
    /// - `Network` / `Status` / `Parse` for transport and protocol failures
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError>;

    /// Opens the incremental stream and yields its lines.
    async fn open_stream(&self, request: CompletionRequest) -> Result<UpstreamLines, CompletionError>;
}

/// Request for a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation the request belongs to; forwarded to stream endpoints.
    pub conversation_id: ConversationId,
    /// History followed by the new user turn.
    pub messages: Vec<ContextMessage>,
}

impl CompletionRequest {
    pub fn new(conversation_id: ConversationId, messages: Vec<ContextMessage>) -> Self {
        Self {
            conversation_id,
            messages,
        }
    }
}

/// A full reply and its metered usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Completion provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// No client or endpoint is configured.
    #[error("completion provider not configured")]
    NotConfigured,

    /// The provider answered without any choice.
    #[error("completion provider returned no choices")]
    EmptyResponse,

    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl CompletionError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true when a streaming send should fall back to the
    /// synthetic stream instead of failing.
    pub fn degrades_stream(&self) -> bool {
        matches!(
            self,
            CompletionError::NotConfigured
                | CompletionError::Network(_)
                | CompletionError::Status { .. }
        )
    }
}
