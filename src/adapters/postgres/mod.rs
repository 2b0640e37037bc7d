//! PostgreSQL adapters - Database implementations for the persistence ports.
//!
//! - `PostgresConversationRepository` - Conversation rows, owner scoped
//! - `PostgresMessageStore` - Turns, attachments and the exchange transaction
//! - `PostgresQuotaLedger` - Quota columns on the users table

mod conversation_repository;
mod message_store;
mod quota_ledger;
mod rows;

pub use conversation_repository::PostgresConversationRepository;
pub use message_store::PostgresMessageStore;
pub use quota_ledger::PostgresQuotaLedger;
