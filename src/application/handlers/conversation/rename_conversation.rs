//! RenameConversationHandler - Command handler for retitling a conversation.

use std::sync::Arc;

use crate::application::EngineError;
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::ConversationRepository;

/// Command to rename a conversation.
#[derive(Debug, Clone)]
pub struct RenameConversationCommand {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub title: String,
}

/// Handler for renaming conversations.
pub struct RenameConversationHandler {
    repository: Arc<dyn ConversationRepository>,
}

impl RenameConversationHandler {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: RenameConversationCommand) -> Result<(), EngineError> {
        let title = cmd.title.trim();
        if title.is_empty() {
            return Err(EngineError::invalid("title must not be empty"));
        }
        if !self
            .repository
            .rename(cmd.user_id, cmd.conversation_id, title)
            .await?
        {
            return Err(EngineError::ConversationNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryStore;

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new().with_conversation(ConversationId::new(5), UserId::new(1), "Old"))
    }

    fn command(user: i64, title: &str) -> RenameConversationCommand {
        RenameConversationCommand {
            user_id: UserId::new(user),
            conversation_id: ConversationId::new(5),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn owner_can_rename() {
        let store = store();
        let handler = RenameConversationHandler::new(store.clone());

        handler.handle(command(1, " New ")).await.unwrap();

        let conversation = store
            .find_owned(UserId::new(1), ConversationId::new(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.title, "New");
    }

    #[tokio::test]
    async fn other_user_gets_not_found() {
        let handler = RenameConversationHandler::new(store());

        let err = handler.handle(command(2, "Mine now")).await.unwrap_err();

        assert_eq!(err, EngineError::ConversationNotFound);
    }

    #[tokio::test]
    async fn blank_title_is_invalid() {
        let handler = RenameConversationHandler::new(store());

        assert_eq!(handler.handle(command(1, "")).await.unwrap_err().err_code(), 400);
    }
}
