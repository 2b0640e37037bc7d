//! HTTP adapters - REST API implementations.
//!
//! Each area has its own adapter (DTOs, handlers, routes); [`router`]
//! assembles them with the cross-cutting layers.

pub mod account;
pub mod conversation;
pub mod error;
pub mod media;
pub mod middleware;
mod router;

pub use error::{ApiError, Envelope};
pub use router::{api_router, AppState, Services};
