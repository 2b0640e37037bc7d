//! HTTP handlers for conversation endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::adapters::http::error::{ok, parse_id, ApiError, Envelope};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::{
    CreateConversationCommand, CreateConversationHandler, DeleteConversationCommand,
    DeleteConversationHandler, GetHistoryHandler, GetHistoryQuery, ListConversationsHandler,
    RenameConversationCommand, RenameConversationHandler,
};
use crate::application::{ConversationGate, SendMessageCommand};
use crate::domain::conversation::PageRequest;
use crate::domain::foundation::{AttachmentId, ConversationId, UserId};

use super::dto::{
    ConversationBody, ConversationDto, ConversationListBody, CreateConversationRequest,
    HistoryBody, HistoryParams, MessageDto, RenameConversationRequest, SendMessageBody,
    SendMessageRequest,
};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ConversationHandlers {
    gate: ConversationGate,
    create_handler: Arc<CreateConversationHandler>,
    rename_handler: Arc<RenameConversationHandler>,
    delete_handler: Arc<DeleteConversationHandler>,
    list_handler: Arc<ListConversationsHandler>,
    history_handler: Arc<GetHistoryHandler>,
}

impl ConversationHandlers {
    pub fn new(
        gate: ConversationGate,
        create_handler: Arc<CreateConversationHandler>,
        rename_handler: Arc<RenameConversationHandler>,
        delete_handler: Arc<DeleteConversationHandler>,
        list_handler: Arc<ListConversationsHandler>,
        history_handler: Arc<GetHistoryHandler>,
    ) -> Self {
        Self {
            gate,
            create_handler,
            rename_handler,
            delete_handler,
            list_handler,
            history_handler,
        }
    }
}

fn send_command(user_id: UserId, conversation_id: ConversationId, req: SendMessageRequest) -> SendMessageCommand {
    SendMessageCommand::new(user_id, conversation_id, req.message.content_type, req.message.content)
        .with_attachments(req.attachment_ids.into_iter().map(AttachmentId::new).collect())
}

// ════════════════════════════════════════════════════════════════════════════
// Conversation lifecycle
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/conversations
pub async fn create_conversation(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateConversationRequest>,
) -> Result<Response, ApiError> {
    let conversation = handlers
        .create_handler
        .handle(CreateConversationCommand {
            user_id: user.id,
            title: req.title,
            system_prompt: req.system_prompt,
        })
        .await?;
    Ok(Json(Envelope::success(ConversationBody {
        conversation: conversation.into(),
    }))
    .into_response())
}

/// GET /api/conversations
pub async fn list_conversations(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
) -> Result<Response, ApiError> {
    let conversations = handlers.list_handler.handle(user.id).await?;
    Ok(Json(Envelope::success(ConversationListBody {
        conversations: conversations.into_iter().map(ConversationDto::from).collect(),
    }))
    .into_response())
}

/// PUT /api/conversations/:conversation_id
pub async fn rename_conversation(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Path(conversation_id): Path<String>,
    Json(req): Json<RenameConversationRequest>,
) -> Result<Response, ApiError> {
    handlers
        .rename_handler
        .handle(RenameConversationCommand {
            user_id: user.id,
            conversation_id: parse_id(&conversation_id, "conversation_id")?,
            title: req.title,
        })
        .await?;
    Ok(ok().into_response())
}

/// DELETE /api/conversations/:conversation_id
pub async fn delete_conversation(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Path(conversation_id): Path<String>,
) -> Result<Response, ApiError> {
    handlers
        .delete_handler
        .handle(DeleteConversationCommand {
            user_id: user.id,
            conversation_id: parse_id(&conversation_id, "conversation_id")?,
        })
        .await?;
    Ok(ok().into_response())
}

/// GET /api/conversations/:conversation_id/messages
pub async fn get_history(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Path(conversation_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    let page = handlers
        .history_handler
        .handle(GetHistoryQuery {
            user_id: user.id,
            conversation_id: parse_id(&conversation_id, "conversation_id")?,
            page: PageRequest::new(params.current_page, params.page_size),
        })
        .await?;
    Ok(Json(Envelope::success(HistoryBody::from(page))).into_response())
}

// ════════════════════════════════════════════════════════════════════════════
// Message send
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/conversations/:conversation_id/messages
pub async fn send_message(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let conversation_id: ConversationId = parse_id(&conversation_id, "conversation_id")?;
    let result = handlers
        .gate
        .send_message(send_command(user.id, conversation_id, req))
        .await?;
    Ok(Json(Envelope::success(SendMessageBody {
        user_message: MessageDto::from(result.user_message),
        model_message: MessageDto::from(result.model_message),
    }))
    .into_response())
}

/// POST /api/conversations/:conversation_id/messages/stream
///
/// Validation failures are ordinary JSON errors; once admitted the reply
/// is a `text/event-stream` that always ends with `data: [DONE]`.
pub async fn stream_message(
    State(handlers): State<ConversationHandlers>,
    RequireAuth(user): RequireAuth,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let conversation_id: ConversationId = parse_id(&conversation_id, "conversation_id")?;
    let frames = handlers
        .gate
        .stream_message(send_command(user.id, conversation_id, req))
        .await?;

    let events = ReceiverStream::new(frames)
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.payload())));
    let sse = Sse::new(events).keep_alive(KeepAlive::default());
    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        sse,
    )
        .into_response())
}
