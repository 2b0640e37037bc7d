//! Conversation domain module.
//!
//! Conversations, their turns and attachments, the context sent to the
//! completion provider, and the event-stream protocol spoken to clients.

mod attachment;
mod context;
mod conversation;
mod pagination;
mod stream_protocol;
mod turn;
mod usage;

pub use attachment::{
    Attachment, AttachmentType, NewAttachment, ResolvedAttachment, StorageClass, DEFAULT_MIME_TYPE,
};
pub use context::{ChatRole, ContentPart, ContextMessage};
pub use conversation::{Conversation, ConversationStatus, NewConversation, UNKNOWN_MODEL};
pub use pagination::{Page, PageRequest, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
pub use stream_protocol::{
    decode_payload, decode_upstream_line, is_placeholder_endpoint, EventAttachment, EventMessage,
    LineBuffer, RelaySession, StreamEnvelope, StreamFrame, StreamState, UpstreamLine,
    UpstreamPayload, DONE_SENTINEL, MOCK_CHUNK_COUNT, PLACEHOLDER_ENDPOINT, SUCCESS_MESSAGE,
};
pub use turn::{estimate_tokens, NewTurn, SenderType, Turn, CONTENT_TYPE_TEXT};
pub use usage::TokenUsage;
