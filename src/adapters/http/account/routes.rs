//! HTTP routes for account endpoints.

use axum::{routing::get, Router};

use super::handlers::{get_me, AccountHandlers};

/// Creates the account router, nested under `/api`.
pub fn account_routes(handlers: AccountHandlers) -> Router {
    Router::new().route("/me", get(get_me)).with_state(handlers)
}
