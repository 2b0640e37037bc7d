//! Builds the provider context from stored history and the new turn.
//!
//! A turn without attachments becomes one text part. A turn with
//! attachments becomes one part per attachment, in stored order, followed
//! by the turn's own text as the last part.

use std::collections::HashMap;

use crate::domain::conversation::{
    ChatRole, ContentPart, ContextMessage, ResolvedAttachment, Turn,
};
use crate::domain::foundation::MessageId;

/// One message for a turn's text and resolved attachments.
pub fn turn_message(role: ChatRole, text: &str, attachments: &[ResolvedAttachment]) -> ContextMessage {
    if attachments.is_empty() {
        return ContextMessage::text(role, text);
    }
    let mut parts: Vec<ContentPart> = attachments
        .iter()
        .map(|r| ContentPart::classify(&r.attachment, r.url.clone()))
        .collect();
    parts.push(ContentPart::Text(text.to_string()));
    ContextMessage { role, parts }
}

/// History in creation order followed by the new user turn.
pub fn assemble_context(
    history: &[Turn],
    history_attachments: &HashMap<MessageId, Vec<ResolvedAttachment>>,
    new_text: &str,
    new_attachments: &[ResolvedAttachment],
) -> Vec<ContextMessage> {
    let mut messages: Vec<ContextMessage> = history
        .iter()
        .map(|turn| {
            let attachments = history_attachments
                .get(&turn.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            turn_message(ChatRole::from(turn.sender), &turn.content, attachments)
        })
        .collect();
    messages.push(turn_message(ChatRole::User, new_text, new_attachments));
    messages
}
