//! Database configuration

use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use super::error::ValidationError;

/// Database configuration
///
/// When `url` is absent the service runs on in-memory stores, which is
/// only meant for local development.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// Minimum connections to maintain
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum connections allowed
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Run migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    /// User registered in the in-memory stores at startup. Ignored when a
    /// database is configured.
    #[serde(default)]
    pub seed_user: Option<SeedUser>,
}

/// Account created for database-less development.
///
/// `CHAT_RELAY__DATABASE__SEED_USER__ID=1` is enough; the session token's
/// subject must carry the same id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedUser {
    pub id: i64,

    #[serde(default = "default_seed_username")]
    pub username: String,

    #[serde(default = "default_seed_quota")]
    pub total_quota: i64,
}

impl SeedUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id <= 0 || self.username.trim().is_empty() || self.total_quota < 0 {
            return Err(ValidationError::InvalidSeedUser);
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Connection URL, if a database is configured
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Pool options derived from this configuration
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }

    /// Validate database configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = self.url() {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(ValidationError::InvalidDatabaseUrl);
            }
        }
        if self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.max_connections > 100 {
            return Err(ValidationError::PoolSizeTooLarge);
        }
        if let Some(seed) = &self.seed_user {
            seed.validate()?;
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_run_migrations(),
            seed_user: None,
        }
    }
}

fn default_min_connections() -> u32 {
    2
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_run_migrations() -> bool {
    true
}

fn default_seed_username() -> String {
    "dev".to_string()
}

fn default_seed_quota() -> i64 {
    1_000_000
}
