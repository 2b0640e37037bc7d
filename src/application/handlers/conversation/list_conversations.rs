//! ListConversationsHandler - Query handler for a user's conversations.

use std::sync::Arc;

use crate::application::EngineError;
use crate::domain::conversation::Conversation;
use crate::domain::foundation::UserId;
use crate::ports::ConversationRepository;

pub struct ListConversationsHandler {
    repository: Arc<dyn ConversationRepository>,
}

impl ListConversationsHandler {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self { repository }
    }

    /// Active conversations, newest first.
    pub async fn handle(&self, user_id: UserId) -> Result<Vec<Conversation>, EngineError> {
        Ok(self.repository.list_for_user(user_id).await?)
    }
}
