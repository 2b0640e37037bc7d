//! Attachments: uploaded artifacts referenced by turns.
//!
//! An attachment is created detached (`message_id == None`) at upload time
//! and bound to a user turn when a send names it. Binding is scoped to the
//! uploader, so one user can never claim another user's upload.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{AttachmentId, MessageId, Timestamp, UserId};

/// MIME type assumed when the client does not provide one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Semantic type of an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentType {
    File,
    Image,
    Audio,
    Video,
    /// Any other tag found in storage, kept verbatim.
    Other(String),
}

impl AttachmentType {
    /// Parses a stored tag, case-insensitively.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "FILE" => AttachmentType::File,
            "IMAGE" => AttachmentType::Image,
            "AUDIO" => AttachmentType::Audio,
            "VIDEO" => AttachmentType::Video,
            _ => AttachmentType::Other(tag.to_string()),
        }
    }

    /// Derives the type of a fresh upload from its MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            AttachmentType::Image
        } else if mime.starts_with("video/") {
            AttachmentType::Video
        } else if mime.starts_with("audio/") {
            AttachmentType::Audio
        } else {
            AttachmentType::File
        }
    }

    /// Stored / API tag.
    pub fn as_str(&self) -> &str {
        match self {
            AttachmentType::File => "FILE",
            AttachmentType::Image => "IMAGE",
            AttachmentType::Audio => "AUDIO",
            AttachmentType::Video => "VIDEO",
            AttachmentType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttachmentType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttachmentType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(AttachmentType::parse(&tag))
    }
}

/// Where the attachment bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    /// On the service's local disk; `location` is a public path.
    #[serde(rename = "LOCAL")]
    Local,
    /// In object storage; `location` is an object key.
    #[serde(rename = "OSS")]
    Remote,
}

impl StorageClass {
    /// Stored tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Local => "LOCAL",
            StorageClass::Remote => "OSS",
        }
    }

    /// Parses a stored tag. Anything that is not remote is treated as local.
    pub fn parse(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case("OSS") {
            StorageClass::Remote
        } else {
            StorageClass::Local
        }
    }
}

/// A stored attachment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    /// Uploader; the only user allowed to bind it.
    pub owner: UserId,
    /// Owning turn, `None` until bound.
    pub message_id: Option<MessageId>,
    pub attachment_type: AttachmentType,
    pub mime_type: String,
    pub storage: StorageClass,
    /// Local public path or object key depending on `storage`.
    pub location: String,
    pub duration_ms: Option<f64>,
    pub created_at: Timestamp,
}

impl Attachment {
    /// Returns true once the attachment has been bound to a turn.
    pub fn is_bound(&self) -> bool {
        self.message_id.is_some()
    }
}

/// An attachment together with a URL the provider or client can fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttachment {
    pub attachment: Attachment,
    pub url: String,
}

/// Values needed to record a fresh upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub owner: UserId,
    pub attachment_type: AttachmentType,
    pub mime_type: String,
    pub storage: StorageClass,
    pub location: String,
    pub duration_ms: Option<f64>,
}

impl NewAttachment {
    /// Describes an upload, deriving its type from the MIME type.
    pub fn upload(
        owner: UserId,
        mime_type: Option<&str>,
        storage: StorageClass,
        location: impl Into<String>,
    ) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        Self {
            owner,
            attachment_type: AttachmentType::from_mime(&mime_type),
            mime_type,
            storage,
            location: location.into(),
            duration_ms: None,
        }
    }
}
