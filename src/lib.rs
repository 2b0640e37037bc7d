//! Chat Relay - conversation orchestration for multimodal chat.
//!
//! Authorizes message sends against conversation ownership and a per-user
//! token quota, rebuilds multi-turn context with attachments for the
//! completion provider, persists each exchange atomically, and delivers
//! replies either whole or as an event stream.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
