//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! [`ConversationGate`] owns the message send in both its synchronous and
//! streamed shapes; the handlers cover the surrounding lifecycle.

mod attachment_resolver;
mod context_assembler;
mod conversation_gate;
mod error;
pub mod handlers;
mod views;

pub use attachment_resolver::AttachmentResolver;
pub use context_assembler::{assemble_context, turn_message};
pub(crate) use conversation_gate::check_quota;
pub use conversation_gate::{ConversationGate, SendMessageCommand, SendMessageResult};
pub use error::EngineError;
pub use views::TurnView;
