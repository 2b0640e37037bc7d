//! PostgreSQL implementation of ConversationRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use super::rows::{conversation_from_row, db_error, CONVERSATION_COLUMNS};
use crate::domain::conversation::{Conversation, ConversationStatus, NewConversation};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{ConversationRepository, StoreError};

/// PostgreSQL implementation of ConversationRepository.
#[derive(Clone)]
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn create(&self, conversation: NewConversation) -> Result<Conversation, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO conversations (user_id, title, status, llm_model, system_prompt)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            CONVERSATION_COLUMNS
        ))
        .bind(conversation.user_id.as_i64())
        .bind(&conversation.title)
        .bind(ConversationStatus::Active.as_str())
        .bind(&conversation.llm_model)
        .bind(conversation.system_prompt)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to insert conversation"))?;

        conversation_from_row(&row)
    }

    async fn find_owned(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM conversations
            WHERE conversation_id = $1 AND user_id = $2 AND status = $3
            "#,
            CONVERSATION_COLUMNS
        ))
        .bind(conversation_id.as_i64())
        .bind(user_id.as_i64())
        .bind(ConversationStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch conversation"))?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn rename(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        title: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET title = $3
            WHERE conversation_id = $1 AND user_id = $2 AND status = $4
            "#,
        )
        .bind(conversation_id.as_i64())
        .bind(user_id.as_i64())
        .bind(title)
        .bind(ConversationStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to rename conversation"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: UserId, conversation_id: ConversationId) -> Result<bool, StoreError> {
        // Soft delete; history rows stay behind for auditing.
        let result = sqlx::query(
            r#"
            UPDATE conversations SET status = $3
            WHERE conversation_id = $1 AND user_id = $2 AND status = $4
            "#,
        )
        .bind(conversation_id.as_i64())
        .bind(user_id.as_i64())
        .bind(ConversationStatus::Deleted.as_str())
        .bind(ConversationStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to delete conversation"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM conversations
            WHERE user_id = $1 AND status = $2
            ORDER BY conversation_id DESC
            "#,
            CONVERSATION_COLUMNS
        ))
        .bind(user_id.as_i64())
        .bind(ConversationStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list conversations"))?;

        rows.iter().map(conversation_from_row).collect()
    }
}
