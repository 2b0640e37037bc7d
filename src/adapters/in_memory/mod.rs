//! In-memory persistence adapters.
//!
//! One [`InMemoryStore`] implements every persistence port over a single
//! mutex, so multi-step operations such as `commit_exchange` are atomic the
//! same way a database transaction is.

mod store;

pub use store::InMemoryStore;
