//! GetAccountHandler - Profile and quota for the signed-in user.

use std::sync::Arc;

use crate::application::EngineError;
use crate::domain::foundation::UserId;
use crate::ports::{Account, QuotaLedger};

pub struct GetAccountHandler {
    quota: Arc<dyn QuotaLedger>,
}

impl GetAccountHandler {
    pub fn new(quota: Arc<dyn QuotaLedger>) -> Self {
        Self { quota }
    }

    /// A valid session for a user without a ledger row is a data error.
    pub async fn handle(&self, user_id: UserId) -> Result<Account, EngineError> {
        self.quota
            .account(user_id)
            .await?
            .ok_or_else(|| EngineError::PersistenceFailure(format!("user {} has no account", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryStore;

    #[tokio::test]
    async fn returns_quota_with_remaining() {
        let store = Arc::new(InMemoryStore::new().with_user(UserId::new(4), "bob", 500, 120));
        let handler = GetAccountHandler::new(store);

        let account = handler.handle(UserId::new(4)).await.unwrap();

        assert_eq!(account.username, "bob");
        assert_eq!(account.quota.total, 500);
        assert_eq!(account.quota.remaining(), 380);
    }

    #[tokio::test]
    async fn unknown_user_is_a_server_error() {
        let handler = GetAccountHandler::new(Arc::new(InMemoryStore::new()));

        let err = handler.handle(UserId::new(4)).await.unwrap_err();

        assert!(err.is_server_error());
    }
}
