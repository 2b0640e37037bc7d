//! HS256 session token validation.
//!
//! Tokens carry the numeric account id in `sub`, the login name in
//! `username`, and an `exp` timestamp.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Claims expected in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id, as a decimal string.
    pub sub: String,
    #[serde(default)]
    pub username: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Validates HS256 tokens signed with a shared secret.
pub struct JwtSessionValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    /// Creates a validator for `secret` with `leeway_secs` of clock skew.
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let id: UserId = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthenticatedUser::new(id, data.claims.username))
    }
}
