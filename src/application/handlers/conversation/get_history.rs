//! GetHistoryHandler - Paged turn history with resolved attachments.

use std::sync::Arc;

use crate::application::{AttachmentResolver, EngineError, TurnView};
use crate::domain::conversation::{Page, PageRequest};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{ConversationRepository, MessageStore};

#[derive(Debug, Clone, Copy)]
pub struct GetHistoryQuery {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub page: PageRequest,
}

pub struct GetHistoryHandler {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageStore>,
    resolver: AttachmentResolver,
}

impl GetHistoryHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageStore>,
        resolver: AttachmentResolver,
    ) -> Self {
        Self {
            conversations,
            messages,
            resolver,
        }
    }

    /// Turns in creation order. A conversation the caller does not own
    /// yields an empty page rather than an error.
    pub async fn handle(&self, query: GetHistoryQuery) -> Result<Page<TurnView>, EngineError> {
        if self
            .conversations
            .find_owned(query.user_id, query.conversation_id)
            .await?
            .is_none()
        {
            return Ok(Page::empty(query.page));
        }

        let total = self.messages.count_messages(query.conversation_id).await?;
        let turns = self
            .messages
            .list_messages(query.conversation_id, query.page)
            .await?;
        let ids: Vec<_> = turns.iter().map(|t| t.id).collect();
        let mut attachments = self
            .resolver
            .resolve_map(self.messages.load_attachments_map(&ids).await?)
            .await?;

        Ok(Page::new(turns, total, query.page)
            .map(|turn| {
                let resolved = attachments.remove(&turn.id).unwrap_or_default();
                TurnView::new(turn, resolved)
            }))
    }
}
