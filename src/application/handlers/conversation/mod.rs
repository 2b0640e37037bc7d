//! Conversation lifecycle handlers.
//!
//! Sending messages lives in [`crate::application::ConversationGate`];
//! these handlers cover everything around it.

mod create_conversation;
mod delete_conversation;
mod get_history;
mod list_conversations;
mod rename_conversation;

pub use create_conversation::{CreateConversationCommand, CreateConversationHandler};
pub use delete_conversation::{DeleteConversationCommand, DeleteConversationHandler};
pub use get_history::{GetHistoryHandler, GetHistoryQuery};
pub use list_conversations::ListConversationsHandler;
pub use rename_conversation::{RenameConversationCommand, RenameConversationHandler};
