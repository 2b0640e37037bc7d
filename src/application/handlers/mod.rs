//! Application handlers.
//!
//! Command and query handlers that orchestrate ports for everything
//! around the message send.

pub mod account;
pub mod conversation;
pub mod media;

pub use account::GetAccountHandler;
pub use conversation::{
    CreateConversationCommand, CreateConversationHandler, DeleteConversationCommand,
    DeleteConversationHandler, GetHistoryHandler, GetHistoryQuery, ListConversationsHandler,
    RenameConversationCommand, RenameConversationHandler,
};
pub use media::{
    AudioChunks, ObjectKeys, SpeechToTextCommand, SpeechToTextHandler, TextToSpeechCommand,
    TextToSpeechHandler, TextToSpeechStreamHandler, UploadAttachmentCommand,
    UploadAttachmentHandler,
};
