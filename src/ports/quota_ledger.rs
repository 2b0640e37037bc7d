//! Quota ledger port.
//!
//! Each user has a fixed token allotment and a cumulative used amount.
//! The ledger only ever adds to `used`.

use async_trait::async_trait;
use serde::Serialize;

use super::StoreError;
use crate::domain::foundation::UserId;

/// A user's allotment and consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub total: i64,
    pub used: i64,
}

impl QuotaUsage {
    pub fn new(total: i64, used: i64) -> Self {
        Self { total, used }
    }

    /// New spend is admitted only while `used < total`.
    pub fn admits_spend(&self) -> bool {
        self.used < self.total
    }

    /// Never negative.
    pub fn remaining(&self) -> i64 {
        (self.total - self.used).max(0)
    }
}

/// Profile fields shown alongside the quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub username: String,
    pub nickname: String,
    pub quota: QuotaUsage,
}

/// Converts a token count to the signed ledger column type.
///
/// # Errors
///
/// `Database` when the count does not fit in an `i64`.
pub fn ledger_amount(amount: u64) -> Result<i64, StoreError> {
    i64::try_from(amount)
        .map_err(|_| StoreError::database(format!("token amount {} exceeds the ledger range", amount)))
}

/// Port for reading and adjusting quota.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Current allotment and usage.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the user has no ledger entry
    async fn usage(&self, user_id: UserId) -> Result<QuotaUsage, StoreError>;

    /// Adds `amount` to `used` unconditionally. Used for speech usage,
    /// which is metered after the admission check has passed.
    async fn increase_used(&self, user_id: UserId, amount: u64) -> Result<(), StoreError>;

    /// Profile and quota, or `None` for an unknown user.
    async fn account(&self, user_id: UserId) -> Result<Option<Account>, StoreError>;
}
