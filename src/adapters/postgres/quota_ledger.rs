//! PostgreSQL implementation of QuotaLedger over the users table.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::rows::db_error;
use crate::domain::foundation::UserId;
use crate::ports::{ledger_amount, Account, QuotaLedger, QuotaUsage, StoreError};

#[derive(Clone)]
pub struct PostgresQuotaLedger {
    pool: PgPool,
}

impl PostgresQuotaLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaLedger for PostgresQuotaLedger {
    async fn usage(&self, user_id: UserId) -> Result<QuotaUsage, StoreError> {
        let row = sqlx::query("SELECT total_quota, used_quota FROM users WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch quota"))?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        Ok(QuotaUsage::new(
            row.try_get("total_quota").map_err(db_error("total_quota"))?,
            row.try_get("used_quota").map_err(db_error("used_quota"))?,
        ))
    }

    async fn increase_used(&self, user_id: UserId, amount: u64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET used_quota = used_quota + $1 WHERE user_id = $2")
            .bind(ledger_amount(amount)?)
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to increase used quota"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    async fn account(&self, user_id: UserId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT username, nickname, total_quota, used_quota FROM users WHERE user_id = $1",
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch account"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Account {
            user_id,
            username: row.try_get("username").map_err(db_error("username"))?,
            nickname: row.try_get("nickname").map_err(db_error("nickname"))?,
            quota: QuotaUsage::new(
                row.try_get("total_quota").map_err(db_error("total_quota"))?,
                row.try_get("used_quota").map_err(db_error("used_quota"))?,
            ),
        }))
    }
}
