//! HTTP routes for conversation endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers::{
    create_conversation, delete_conversation, get_history, list_conversations,
    rename_conversation, send_message, stream_message, ConversationHandlers,
};

/// Creates the conversation router, nested under `/api/conversations`.
pub fn conversation_routes(handlers: ConversationHandlers) -> Router {
    Router::new()
        .route("/", post(create_conversation).get(list_conversations))
        .route(
            "/:conversation_id",
            put(rename_conversation).delete(delete_conversation),
        )
        .route(
            "/:conversation_id/messages",
            get(get_history).post(send_message),
        )
        .route("/:conversation_id/messages/stream", post(stream_message))
        .with_state(handlers)
}
