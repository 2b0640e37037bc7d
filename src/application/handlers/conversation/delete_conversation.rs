//! DeleteConversationHandler - Soft-deletes a conversation.
//!
//! Turns are kept; the conversation simply stops being visible to its
//! owner and can no longer receive messages.

use std::sync::Arc;

use crate::application::EngineError;
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::ConversationRepository;

#[derive(Debug, Clone, Copy)]
pub struct DeleteConversationCommand {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
}

pub struct DeleteConversationHandler {
    repository: Arc<dyn ConversationRepository>,
}

impl DeleteConversationHandler {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: DeleteConversationCommand) -> Result<(), EngineError> {
        if !self.repository.delete(cmd.user_id, cmd.conversation_id).await? {
            return Err(EngineError::ConversationNotFound);
        }
        tracing::info!(conversation_id = %cmd.conversation_id, "Conversation deleted");
        Ok(())
    }
}
