//! Provider-facing context vocabulary.
//!
//! Completion providers take an ordered list of role-tagged messages whose
//! content is either plain text or a list of typed parts. For multimodal
//! turns the provider convention is: every attachment part first, the turn
//! text last.

use serde::{Deserialize, Serialize};

use super::attachment::{Attachment, AttachmentType};
use super::turn::SenderType;

/// Role of a message in provider context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<SenderType> for ChatRole {
    fn from(sender: SenderType) -> Self {
        match sender {
            SenderType::User => ChatRole::User,
            SenderType::Assistant => ChatRole::Assistant,
            SenderType::System => ChatRole::System,
        }
    }
}

/// One element of a multi-part message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text; also used to carry the URL of attachments the
    /// provider cannot render natively.
    Text(String),
    /// Image the provider should fetch from the URL.
    ImageRef(String),
    /// Video the provider should fetch from the URL.
    VideoRef(String),
}

impl ContentPart {
    /// Chooses the part shape for an attachment whose bytes are reachable
    /// at `resolved_url`.
    ///
    /// Declared IMAGE type or an `image/` MIME prefix wins first, then a
    /// `video/` MIME prefix. Everything else degrades to a text part.
    pub fn classify(attachment: &Attachment, resolved_url: impl Into<String>) -> Self {
        let url = resolved_url.into();
        let mime = attachment.mime_type.to_ascii_lowercase();
        if attachment.attachment_type == AttachmentType::Image || mime.starts_with("image/") {
            ContentPart::ImageRef(url)
        } else if mime.starts_with("video/") {
            ContentPart::VideoRef(url)
        } else {
            ContentPart::Text(url)
        }
    }

    /// Returns the text when this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A role-tagged message ready for the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: ChatRole,
    pub parts: Vec<ContentPart>,
}

impl ContextMessage {
    /// Message consisting of a single text part.
    pub fn text(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Returns the text when the message is a single text part.
    pub fn as_plain_text(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [only] => only.as_text(),
            _ => None,
        }
    }
}
