//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, auth identity, errors)
//! - `conversation` - Conversations, turns, attachments, provider context and stream framing

pub mod conversation;
pub mod foundation;
