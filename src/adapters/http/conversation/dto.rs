//! HTTP DTOs for conversation endpoints.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};

use crate::application::TurnView;
use crate::domain::conversation::{Conversation, Page, ResolvedAttachment};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request to start a conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationRequest {
    pub title: String,
    /// Prompt preset reference; kept only when numeric.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

/// The user turn of a send.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageInput {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

/// Body of both the synchronous and the streamed send.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub message: MessageInput,
    #[serde(default)]
    pub attachment_ids: Vec<i64>,
}

/// Query parameters for history paging.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryParams {
    pub current_page: Option<i64>,
    pub page_size: Option<i64>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDto {
    pub conversation_id: i64,
    pub title: String,
    pub status: &'static str,
    pub llm_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<i64>,
    pub created_at: String,
}

impl From<Conversation> for ConversationDto {
    fn from(c: Conversation) -> Self {
        Self {
            conversation_id: c.id.as_i64(),
            title: c.title,
            status: c.status.as_str(),
            llm_model: c.llm_model,
            system_prompt: c.system_prompt,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationBody {
    pub conversation: ConversationDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationListBody {
    pub conversations: Vec<ConversationDto>,
}

/// An attachment with the URL clients should fetch it from.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentDto {
    pub attachment_id: i64,
    pub attachment_type: String,
    pub mime_type: String,
    pub url_or_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    pub created_at: String,
}

impl From<ResolvedAttachment> for AttachmentDto {
    fn from(resolved: ResolvedAttachment) -> Self {
        let a = resolved.attachment;
        Self {
            attachment_id: a.id.as_i64(),
            attachment_type: a.attachment_type.as_str().to_string(),
            mime_type: a.mime_type,
            url_or_path: resolved.url,
            duration_ms: a.duration_ms,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// A stored turn. `role` mirrors `sender_type` for clients of the stream shape.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub message_id: i64,
    pub conversation_id: i64,
    pub role: &'static str,
    pub sender_type: &'static str,
    pub content_type: String,
    pub content: String,
    pub token_total: i64,
    pub created_at: String,
    pub attachments: Vec<AttachmentDto>,
}

impl From<TurnView> for MessageDto {
    fn from(view: TurnView) -> Self {
        let turn = view.turn;
        Self {
            message_id: turn.id.as_i64(),
            conversation_id: turn.conversation_id.as_i64(),
            role: turn.sender.as_str(),
            sender_type: turn.sender.as_str(),
            content_type: turn.content_type,
            content: turn.content,
            token_total: turn.token_total,
            created_at: turn.created_at.to_rfc3339(),
            attachments: view.attachments.into_iter().map(AttachmentDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageBody {
    pub user_message: MessageDto,
    pub model_message: MessageDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryBody {
    pub messages: Vec<MessageDto>,
    pub total_count: i64,
    pub total_page: i64,
    pub current_page: i64,
    pub page_size: i64,
}

impl From<Page<TurnView>> for HistoryBody {
    fn from(page: Page<TurnView>) -> Self {
        let page = page.map(MessageDto::from);
        Self {
            messages: page.items,
            total_count: page.total_count,
            total_page: page.total_page,
            current_page: page.current_page,
            page_size: page.page_size,
        }
    }
}
