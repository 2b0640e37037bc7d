//! Row decoding shared by the PostgreSQL adapters.

use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::conversation::{
    Attachment, AttachmentType, Conversation, ConversationStatus, SenderType, StorageClass, Turn,
};
use crate::domain::foundation::{AttachmentId, ConversationId, MessageId, Timestamp, UserId};
use crate::ports::StoreError;

pub(super) const CONVERSATION_COLUMNS: &str =
    "conversation_id, user_id, title, status, llm_model, system_prompt, created_at";

pub(super) const MESSAGE_COLUMNS: &str =
    "message_id, conversation_id, sender_type, content_type, content, token_total, created_at";

pub(super) const ATTACHMENT_COLUMNS: &str = "attachment_id, owner_user_id, message_id, \
     attachment_type, mime_type, storage_type, url_or_path, duration_ms, created_at";

pub(super) fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Database(format!("{}: {}", context, e))
}

pub(super) fn conversation_from_row(row: &PgRow) -> Result<Conversation, StoreError> {
    let status: String = row.try_get("status").map_err(db_error("status"))?;
    let status = status
        .parse::<ConversationStatus>()
        .map_err(|e| StoreError::database(e.to_string()))?;
    Ok(Conversation {
        id: ConversationId::new(row.try_get("conversation_id").map_err(db_error("conversation_id"))?),
        user_id: UserId::new(row.try_get("user_id").map_err(db_error("user_id"))?),
        title: row.try_get("title").map_err(db_error("title"))?,
        status,
        llm_model: row.try_get("llm_model").map_err(db_error("llm_model"))?,
        system_prompt: row.try_get("system_prompt").map_err(db_error("system_prompt"))?,
        created_at: Timestamp::from_datetime(row.try_get("created_at").map_err(db_error("created_at"))?),
    })
}

pub(super) fn turn_from_row(row: &PgRow) -> Result<Turn, StoreError> {
    Ok(Turn {
        id: MessageId::new(row.try_get("message_id").map_err(db_error("message_id"))?),
        conversation_id: ConversationId::new(
            row.try_get("conversation_id").map_err(db_error("conversation_id"))?,
        ),
        sender: SenderType::from_code(row.try_get("sender_type").map_err(db_error("sender_type"))?),
        content_type: row.try_get("content_type").map_err(db_error("content_type"))?,
        content: row.try_get("content").map_err(db_error("content"))?,
        token_total: row.try_get("token_total").map_err(db_error("token_total"))?,
        created_at: Timestamp::from_datetime(row.try_get("created_at").map_err(db_error("created_at"))?),
    })
}

pub(super) fn attachment_from_row(row: &PgRow) -> Result<Attachment, StoreError> {
    let attachment_type: String = row.try_get("attachment_type").map_err(db_error("attachment_type"))?;
    let storage: String = row.try_get("storage_type").map_err(db_error("storage_type"))?;
    let message_id: Option<i64> = row.try_get("message_id").map_err(db_error("message_id"))?;
    Ok(Attachment {
        id: AttachmentId::new(row.try_get("attachment_id").map_err(db_error("attachment_id"))?),
        owner: UserId::new(row.try_get("owner_user_id").map_err(db_error("owner_user_id"))?),
        message_id: message_id.map(MessageId::new),
        attachment_type: AttachmentType::parse(&attachment_type),
        mime_type: row.try_get("mime_type").map_err(db_error("mime_type"))?,
        storage: StorageClass::parse(&storage),
        location: row.try_get("url_or_path").map_err(db_error("url_or_path"))?,
        duration_ms: row.try_get("duration_ms").map_err(db_error("duration_ms"))?,
        created_at: Timestamp::from_datetime(row.try_get("created_at").map_err(db_error("created_at"))?),
    })
}
