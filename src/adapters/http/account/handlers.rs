//! HTTP handlers for account endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::adapters::http::error::{ApiError, Envelope};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::GetAccountHandler;
use crate::ports::Account;

#[derive(Clone)]
pub struct AccountHandlers {
    account_handler: Arc<GetAccountHandler>,
}

impl AccountHandlers {
    pub fn new(account_handler: Arc<GetAccountHandler>) -> Self {
        Self { account_handler }
    }
}

/// Profile and quota of the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBody {
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub total_quota: i64,
    pub used_quota: i64,
    pub remaining_quota: i64,
}

impl From<Account> for AccountBody {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.user_id.as_i64(),
            username: account.username,
            nickname: account.nickname,
            total_quota: account.quota.total,
            used_quota: account.quota.used,
            remaining_quota: account.quota.remaining(),
        }
    }
}

/// GET /api/me
pub async fn get_me(
    State(handlers): State<AccountHandlers>,
    RequireAuth(user): RequireAuth,
) -> Result<Response, ApiError> {
    let account = handlers.account_handler.handle(user.id).await?;
    Ok(Json(Envelope::success(AccountBody::from(account))).into_response())
}
