//! Conversation repository port.
//!
//! Every lookup is scoped by the owning user: a conversation that belongs
//! to someone else is indistinguishable from one that does not exist.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::conversation::{Conversation, NewConversation};
use crate::domain::foundation::{ConversationId, UserId};

/// Repository port for conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Stores a new `ACTIVE` conversation and returns it with its id.
    async fn create(&self, conversation: NewConversation) -> Result<Conversation, StoreError>;

    /// Finds an active conversation owned by `user_id`.
    ///
    /// Deleted conversations are not returned.
    async fn find_owned(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Renames an active conversation. Returns false when nothing matched.
    async fn rename(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        title: &str,
    ) -> Result<bool, StoreError>;

    /// Marks an active conversation deleted. Returns false when nothing matched.
    async fn delete(&self, user_id: UserId, conversation_id: ConversationId) -> Result<bool, StoreError>;

    /// Lists the user's active conversations, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>, StoreError>;
}
