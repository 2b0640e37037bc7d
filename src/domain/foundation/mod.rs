//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, time values, auth identity, validation errors and
//! the state machine contract that form the vocabulary of the chat relay
//! domain.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::ValidationError;
pub use ids::{AttachmentId, ConversationId, MessageId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
