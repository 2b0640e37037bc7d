//! Authentication configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Session token validation configuration (HS256)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret tokens are signed with
    pub jwt_secret: Secret<String>,

    /// Allowed clock skew in seconds
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

impl AuthConfig {
    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.expose_secret()
    }

    /// Validate authentication configuration
    ///
    /// In production the secret must be at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.jwt_secret().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"));
        }
        if *environment == Environment::Production && self.jwt_secret().len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        Ok(())
    }
}

fn default_leeway() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: Secret::new(secret.to_string()),
            leeway_secs: default_leeway(),
        }
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(
            config("").validate(&Environment::Development),
            Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"))
        );
    }

    #[test]
    fn short_secret_allowed_outside_production() {
        assert!(config("dev").validate(&Environment::Development).is_ok());
        assert_eq!(
            config("dev").validate(&Environment::Production),
            Err(ValidationError::WeakJwtSecret)
        );
    }
}
