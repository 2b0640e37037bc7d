//! HTTP adapter for conversation and message endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    AttachmentDto, ConversationDto, CreateConversationRequest, HistoryParams, MessageDto,
    MessageInput, RenameConversationRequest, SendMessageRequest,
};
pub use handlers::ConversationHandlers;
pub use routes::conversation_routes;
