//! PostgreSQL implementation of MessageStore.
//!
//! `commit_exchange` runs the quota debit, both turn inserts and the
//! attachment rebind in one transaction. Dropping the transaction on an
//! early return rolls everything back.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

use super::rows::{attachment_from_row, db_error, turn_from_row, ATTACHMENT_COLUMNS, MESSAGE_COLUMNS};
use crate::domain::conversation::{Attachment, NewAttachment, NewTurn, PageRequest, Turn};
use crate::domain::foundation::{AttachmentId, ConversationId, MessageId, UserId};
use crate::ports::{ledger_amount, CommittedExchange, Exchange, MessageStore, StoreError};

/// PostgreSQL implementation of MessageStore.
#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Adds to `used_quota` only while it is still below the total.
const DEBIT_SQL: &str = r#"
    UPDATE users SET used_quota = used_quota + $1
    WHERE user_id = $2 AND used_quota < total_quota
"#;

fn raw_ids<T>(ids: &[T], f: impl Fn(&T) -> i64) -> Vec<i64> {
    ids.iter().map(f).collect()
}

async fn insert_turn(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: ConversationId,
    turn: &NewTurn,
) -> Result<Turn, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO messages (conversation_id, sender_type, content_type, content, token_total)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        MESSAGE_COLUMNS
    ))
    .bind(conversation_id.as_i64())
    .bind(turn.sender.code())
    .bind(&turn.content_type)
    .bind(&turn.content)
    .bind(turn.token_total)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error("Failed to insert message"))?;

    turn_from_row(&row)
}

async fn rebind_attachments(
    tx: &mut Transaction<'_, Postgres>,
    owner: UserId,
    message_id: MessageId,
    attachment_ids: &[AttachmentId],
) -> Result<u64, StoreError> {
    if attachment_ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        r#"
        UPDATE message_attachments SET message_id = $1
        WHERE attachment_id = ANY($2) AND owner_user_id = $3
        "#,
    )
    .bind(message_id.as_i64())
    .bind(raw_ids(attachment_ids, AttachmentId::as_i64))
    .bind(owner.as_i64())
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to bind attachments"))?;

    Ok(result.rows_affected())
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        turn: NewTurn,
    ) -> Result<Turn, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to start transaction"))?;
        let stored = insert_turn(&mut tx, conversation_id, &turn).await?;
        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        Ok(stored)
    }

    async fn attach_files_to_message(
        &self,
        owner: UserId,
        message_id: MessageId,
        attachment_ids: &[AttachmentId],
    ) -> Result<u64, StoreError> {
        if attachment_ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to start transaction"))?;
        let rebound = rebind_attachments(&mut tx, owner, message_id, attachment_ids).await?;
        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        Ok(rebound)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM messages
            WHERE conversation_id = $1
            ORDER BY message_id ASC
            LIMIT $2 OFFSET $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id.as_i64())
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list messages"))?;

        rows.iter().map(turn_from_row).collect()
    }

    async fn count_messages(&self, conversation_id: ConversationId) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM messages WHERE conversation_id = $1")
            .bind(conversation_id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count messages"))?;

        row.try_get("total").map_err(db_error("total"))
    }

    async fn list_all_messages(&self, conversation_id: ConversationId) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE conversation_id = $1 ORDER BY message_id ASC",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list messages"))?;

        rows.iter().map(turn_from_row).collect()
    }

    async fn load_attachments_map(
        &self,
        message_ids: &[MessageId],
    ) -> Result<HashMap<MessageId, Vec<Attachment>>, StoreError> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM message_attachments
            WHERE message_id = ANY($1)
            ORDER BY attachment_id ASC
            "#,
            ATTACHMENT_COLUMNS
        ))
        .bind(raw_ids(message_ids, MessageId::as_i64))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load attachments"))?;

        let mut map: HashMap<MessageId, Vec<Attachment>> = HashMap::new();
        for row in &rows {
            let attachment = attachment_from_row(row)?;
            if let Some(message_id) = attachment.message_id {
                map.entry(message_id).or_default().push(attachment);
            }
        }
        Ok(map)
    }

    async fn load_attachments_by_ids(
        &self,
        owner: UserId,
        attachment_ids: &[AttachmentId],
    ) -> Result<Vec<Attachment>, StoreError> {
        if attachment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM message_attachments
            WHERE attachment_id = ANY($1) AND owner_user_id = $2
            "#,
            ATTACHMENT_COLUMNS
        ))
        .bind(raw_ids(attachment_ids, AttachmentId::as_i64))
        .bind(owner.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load attachments"))?;

        let mut by_id = rows
            .iter()
            .map(|row| attachment_from_row(row).map(|a| (a.id, a)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(attachment_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn create_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO message_attachments
                (owner_user_id, attachment_type, mime_type, storage_type, url_or_path, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ATTACHMENT_COLUMNS
        ))
        .bind(attachment.owner.as_i64())
        .bind(attachment.attachment_type.as_str())
        .bind(&attachment.mime_type)
        .bind(attachment.storage.as_str())
        .bind(&attachment.location)
        .bind(attachment.duration_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to insert attachment"))?;

        attachment_from_row(&row)
    }

    async fn find_message(&self, user_id: UserId, message_id: MessageId) -> Result<Option<Turn>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT m.message_id, m.conversation_id, m.sender_type, m.content_type,
                   m.content, m.token_total, m.created_at
            FROM messages m
            JOIN conversations c ON c.conversation_id = m.conversation_id
            WHERE m.message_id = $1 AND c.user_id = $2 AND c.status = 'ACTIVE'
            "#,
        )
        .bind(message_id.as_i64())
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch message"))?;

        row.as_ref().map(turn_from_row).transpose()
    }

    async fn commit_exchange(&self, exchange: Exchange) -> Result<CommittedExchange, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to start transaction"))?;

        if exchange.debit > 0 {
            let debited = sqlx::query(DEBIT_SQL)
                .bind(ledger_amount(exchange.debit)?)
                .bind(exchange.user_id.as_i64())
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to debit quota"))?;
            if debited.rows_affected() == 0 {
                return Err(StoreError::QuotaExceeded);
            }
        }

        let user_turn = insert_turn(&mut tx, exchange.conversation_id, &exchange.user_turn).await?;
        rebind_attachments(&mut tx, exchange.user_id, user_turn.id, &exchange.attachment_ids).await?;
        let assistant_turn =
            insert_turn(&mut tx, exchange.conversation_id, &exchange.assistant_turn).await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM message_attachments WHERE message_id = $1 ORDER BY attachment_id ASC",
            ATTACHMENT_COLUMNS
        ))
        .bind(user_turn.id.as_i64())
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to reload attachments"))?;
        let attachments = rows.iter().map(attachment_from_row).collect::<Result<_, _>>()?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;

        Ok(CommittedExchange {
            user_turn,
            assistant_turn,
            attachments,
        })
    }
}
