//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - OpenAI-compatible completion client and its mock
//! - `auth` - JWT session validation and its mock
//! - `http` - axum routes, middleware and error mapping
//! - `in_memory` - Mutex-backed stores for tests and database-less runs
//! - `postgres` - sqlx repositories
//! - `speech` - DashScope speech client and its mock
//! - `storage` - Object storage (S3-compatible, in-memory) and local disk

pub mod ai;
pub mod auth;
pub mod http;
pub mod in_memory;
pub mod postgres;
pub mod speech;
pub mod storage;
