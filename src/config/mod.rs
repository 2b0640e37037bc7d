//! Application configuration module
//!
//! This module provides type-safe configuration loading using the `config`
//! and `dotenvy` crates. Values come from an optional YAML file and from
//! environment variables with the `CHAT_RELAY` prefix; nested values use
//! double underscores as separators. Environment variables win.
//!
//! # Example
//!
//! ```no_run
//! use chat_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod auth;
mod database;
mod error;
mod llm;
mod server;
mod speech;
mod storage;

pub use auth::AuthConfig;
pub use database::{DatabaseConfig, SeedUser};
pub use error::{ConfigError, ValidationError};
pub use llm::LlmConfig;
pub use server::{Environment, ServerConfig};
pub use speech::{SpeechConfig, SttConfig, TtsConfig};
pub use storage::{StorageConfig, DEFAULT_TEMP_URL_TTL};

use serde::Deserialize;

/// Environment variable naming the YAML config file.
pub const CONFIG_FILE_ENV: &str = "CHAT_RELAY_CONFIG_FILE";

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, uploads)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration (session token secret)
    pub auth: AuthConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Speech provider configuration
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Load configuration from the optional YAML file and the environment
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads the YAML file named by `CHAT_RELAY_CONFIG_FILE` (default
    ///    `config.yaml`) if it exists
    /// 3. Reads environment variables with `CHAT_RELAY` prefix, using `__`
    ///    to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `CHAT_RELAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `CHAT_RELAY__STORAGE__BUCKET=media` -> `storage.bucket = media`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required values are missing or cannot be
    /// parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::default()
                    .prefix("CHAT_RELAY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.llm.validate()?;
        self.storage.validate()?;
        self.speech.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "CHAT_RELAY__AUTH__JWT_SECRET",
        "CHAT_RELAY__SERVER__PORT",
        "CHAT_RELAY__SERVER__ENVIRONMENT",
        "CHAT_RELAY__STORAGE__BUCKET",
        "CHAT_RELAY__LLM__MODEL",
        "CHAT_RELAY__DATABASE__SEED_USER__ID",
        CONFIG_FILE_ENV,
    ];

    fn set_minimal_env() {
        env::set_var("CHAT_RELAY__AUTH__JWT_SECRET", "dev-secret");
        env::set_var(CONFIG_FILE_ENV, "does-not-exist.yaml");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CHAT_RELAY__STORAGE__BUCKET", "media");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.auth.jwt_secret(), "dev-secret");
        assert_eq!(config.storage.bucket, "media");
        assert!(!config.storage.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.database.url(), None);
        assert!(!config.llm.is_configured());
        assert_eq!(config.speech.timeout_secs, 60);
    }

    #[test]
    fn test_seed_user_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CHAT_RELAY__DATABASE__SEED_USER__ID", "7");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let seed = config.database.seed_user.as_ref().expect("seed user should load");
        assert_eq!(seed.id, 7);
        assert_eq!(seed.username, "dev");
        assert_eq!(seed.total_quota, 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_jwt_secret_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var(CONFIG_FILE_ENV, "does-not-exist.yaml");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_yaml_file_is_read() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.yaml");
        std::fs::write(
            &path,
            "auth:\n  jwt_secret: from-file\nllm:\n  model: file-model\nserver:\n  port: 9000\n",
        )
        .unwrap();
        env::set_var(CONFIG_FILE_ENV, path.to_str().unwrap());
        env::set_var("CHAT_RELAY__SERVER__PORT", "9100");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.auth.jwt_secret(), "from-file");
        assert_eq!(config.llm.model, "file-model");
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CHAT_RELAY__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::WeakJwtSecret));
    }
}
