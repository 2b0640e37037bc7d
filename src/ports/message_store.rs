//! Message store port.
//!
//! Persists turns and attachment bindings and answers history queries.
//! Creation order is the message id: a later insert always gets a larger id.
//!
//! # Exchange commit
//!
//! A completed send is written through [`MessageStore::commit_exchange`],
//! which performs, as one unit of work:
//!
//! 1. conditional quota debit (`used < total`, skipped for zero)
//! 2. user turn insert
//! 3. attachment rebind to the user turn (owner scoped)
//! 4. assistant turn insert
//!
//! Any failure leaves no trace of the exchange.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::conversation::{
    Attachment, NewAttachment, NewTurn, PageRequest, Turn,
};
use crate::domain::foundation::{AttachmentId, ConversationId, MessageId, UserId};

/// Storage errors shared by the persistence ports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Conditional quota debit matched no row.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Database failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}

/// Everything persisted by one successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub user_turn: NewTurn,
    /// Attachments to bind to the user turn; ids not owned by `user_id` are ignored.
    pub attachment_ids: Vec<AttachmentId>,
    pub assistant_turn: NewTurn,
    /// Tokens to add to the user's used quota.
    pub debit: u64,
}

/// Stored result of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedExchange {
    pub user_turn: Turn,
    pub assistant_turn: Turn,
    /// Attachments now bound to the user turn.
    pub attachments: Vec<Attachment>,
}

/// Repository port for turns and attachments.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a single turn.
    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        turn: NewTurn,
    ) -> Result<Turn, StoreError>;

    /// Binds attachments owned by `owner` to `message_id`.
    ///
    /// An empty id list is a no-op. Returns the number of rows rebound.
    async fn attach_files_to_message(
        &self,
        owner: UserId,
        message_id: MessageId,
        attachment_ids: &[AttachmentId],
    ) -> Result<u64, StoreError>;

    /// One page of turns in creation order.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> Result<Vec<Turn>, StoreError>;

    async fn count_messages(&self, conversation_id: ConversationId) -> Result<i64, StoreError>;

    /// Every turn in creation order, for context assembly.
    async fn list_all_messages(&self, conversation_id: ConversationId) -> Result<Vec<Turn>, StoreError>;

    /// Attachments grouped by owning message, in id order within a message.
    async fn load_attachments_map(
        &self,
        message_ids: &[MessageId],
    ) -> Result<HashMap<MessageId, Vec<Attachment>>, StoreError>;

    /// Attachments with the given ids that `owner` uploaded, in request order.
    async fn load_attachments_by_ids(
        &self,
        owner: UserId,
        attachment_ids: &[AttachmentId],
    ) -> Result<Vec<Attachment>, StoreError>;

    /// Records a fresh, unbound upload.
    async fn create_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError>;

    /// Finds a turn in one of the user's active conversations.
    async fn find_message(&self, user_id: UserId, message_id: MessageId) -> Result<Option<Turn>, StoreError>;

    /// Persists a completed send atomically. See the module docs.
    ///
    /// # Errors
    ///
    /// - `QuotaExceeded` if the conditional debit matched no row
    /// - `Database` on any other failure
    async fn commit_exchange(&self, exchange: Exchange) -> Result<CommittedExchange, StoreError>;
}
