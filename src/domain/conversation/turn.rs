//! Turns: the immutable messages that make up a conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ConversationId, MessageId, Timestamp};

/// Content type tag for plain text turns.
pub const CONTENT_TYPE_TEXT: &str = "TEXT";

/// Who produced a turn.
///
/// Stored as a small integer code; the API uses the upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderType {
    User,
    Assistant,
    System,
}

impl SenderType {
    /// Database code.
    pub fn code(&self) -> i16 {
        match self {
            SenderType::User => 1,
            SenderType::Assistant => 2,
            SenderType::System => 3,
        }
    }

    /// Decodes a stored code. Unknown codes are read as `User`.
    pub fn from_code(code: i16) -> Self {
        match code {
            2 => SenderType::Assistant,
            3 => SenderType::System,
            _ => SenderType::User,
        }
    }

    /// API name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::User => "USER",
            SenderType::Assistant => "ASSISTANT",
            SenderType::System => "SYSTEM",
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Also the creation order within the conversation.
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: SenderType,
    pub content_type: String,
    pub content: String,
    pub token_total: i64,
    pub created_at: Timestamp,
}

/// A turn that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub sender: SenderType,
    pub content_type: String,
    pub content: String,
    pub token_total: i64,
}

impl NewTurn {
    /// Builds a turn whose token estimate is the byte length of its content.
    pub fn new(sender: SenderType, content_type: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            sender,
            content_type: content_type.into(),
            token_total: estimate_tokens(&content),
            content,
        }
    }

    /// User turn as submitted by the client.
    pub fn user(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(SenderType::User, content_type, content)
    }

    /// Assistant reply; always plain text.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(SenderType::Assistant, CONTENT_TYPE_TEXT, content)
    }
}

/// Rough token estimate recorded with each turn: the UTF-8 byte length.
pub fn estimate_tokens(content: &str) -> i64 {
    content.len() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_codes_round_trip() {
        for sender in [SenderType::User, SenderType::Assistant, SenderType::System] {
            assert_eq!(SenderType::from_code(sender.code()), sender);
        }
    }

    #[test]
    fn unknown_sender_code_reads_as_user() {
        assert_eq!(SenderType::from_code(0), SenderType::User);
        assert_eq!(SenderType::from_code(99), SenderType::User);
    }

    #[test]
    fn sender_serializes_as_api_name() {
        assert_eq!(serde_json::to_string(&SenderType::Assistant).unwrap(), "\"ASSISTANT\"");
    }

    #[test]
    fn token_estimate_counts_bytes() {
        let turn = NewTurn::user("TEXT", "héllo");
        assert_eq!(turn.token_total, 6);
    }

    #[test]
    fn assistant_turn_is_text() {
        let turn = NewTurn::assistant("ok");
        assert_eq!(turn.content_type, CONTENT_TYPE_TEXT);
        assert_eq!(turn.sender, SenderType::Assistant);
    }
}
