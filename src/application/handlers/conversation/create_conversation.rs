//! CreateConversationHandler - Command handler for starting conversations.

use std::sync::Arc;

use crate::application::EngineError;
use crate::domain::conversation::{Conversation, NewConversation};
use crate::domain::foundation::UserId;
use crate::ports::ConversationRepository;

/// Command to create a new conversation.
#[derive(Debug, Clone)]
pub struct CreateConversationCommand {
    pub user_id: UserId,
    pub title: String,
    /// Reference to a prompt preset; ignored unless numeric.
    pub system_prompt: Option<String>,
}

/// Handler for creating conversations.
pub struct CreateConversationHandler {
    repository: Arc<dyn ConversationRepository>,
    model: String,
}

impl CreateConversationHandler {
    /// `model` is recorded on every new conversation.
    pub fn new(repository: Arc<dyn ConversationRepository>, model: impl Into<String>) -> Self {
        Self {
            repository,
            model: model.into(),
        }
    }

    pub async fn handle(&self, cmd: CreateConversationCommand) -> Result<Conversation, EngineError> {
        let new = NewConversation::new(
            cmd.user_id,
            cmd.title,
            self.model.clone(),
            cmd.system_prompt.as_deref(),
        )?;
        let conversation = self.repository.create(new).await?;

        tracing::info!(
            conversation_id = %conversation.id,
            user_id = %conversation.user_id,
            "Conversation created"
        );
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryStore;
    use crate::domain::conversation::{ConversationStatus, UNKNOWN_MODEL};

    fn command(title: &str, system_prompt: Option<&str>) -> CreateConversationCommand {
        CreateConversationCommand {
            user_id: UserId::new(1),
            title: title.to_string(),
            system_prompt: system_prompt.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn creates_active_conversation_with_configured_model() {
        let handler = CreateConversationHandler::new(Arc::new(InMemoryStore::new()), "qwen-vl");

        let conversation = handler.handle(command("Trip plans", Some("3"))).await.unwrap();

        assert_eq!(conversation.title, "Trip plans");
        assert_eq!(conversation.status, ConversationStatus::Active);
        assert_eq!(conversation.llm_model, "qwen-vl");
        assert_eq!(conversation.system_prompt, Some(3));
    }

    #[tokio::test]
    async fn missing_model_is_recorded_as_unknown() {
        let handler = CreateConversationHandler::new(Arc::new(InMemoryStore::new()), "");

        let conversation = handler.handle(command("Chat", Some("default"))).await.unwrap();

        assert_eq!(conversation.llm_model, UNKNOWN_MODEL);
        assert_eq!(conversation.system_prompt, None);
    }

    #[tokio::test]
    async fn empty_title_is_invalid() {
        let handler = CreateConversationHandler::new(Arc::new(InMemoryStore::new()), "m");

        let err = handler.handle(command("  ", None)).await.unwrap_err();

        assert_eq!(err.err_code(), 400);
    }
}
