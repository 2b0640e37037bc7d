//! Read models returned by the application layer.

use crate::domain::conversation::{ResolvedAttachment, Turn};

/// A stored turn with its attachments resolved to fetchable URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
    pub turn: Turn,
    pub attachments: Vec<ResolvedAttachment>,
}

impl TurnView {
    pub fn new(turn: Turn, attachments: Vec<ResolvedAttachment>) -> Self {
        Self { turn, attachments }
    }
}
