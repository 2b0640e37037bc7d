//! HTTP adapter for the signed-in user's account.

mod handlers;
mod routes;

pub use handlers::{AccountBody, AccountHandlers};
pub use routes::account_routes;
