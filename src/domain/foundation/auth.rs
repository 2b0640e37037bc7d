//! Authentication types for the domain layer.
//!
//! An `AuthenticatedUser` is what the HTTP layer hands to handlers after a
//! bearer token has been validated. Token mechanics live behind the
//! `SessionValidator` port.

use super::UserId;
use thiserror::Error;

/// Caller identity extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Account key used to scope every conversation and quota lookup.
    pub id: UserId,

    /// Login name carried in the token.
    pub username: String,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The validator could not be used (bad configuration, key material).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this error indicates the user should re-authenticate.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reauthentication_required_for_token_errors() {
        assert!(AuthError::InvalidToken.requires_reauthentication());
        assert!(AuthError::TokenExpired.requires_reauthentication());
        assert!(!AuthError::service_unavailable("down").requires_reauthentication());
    }

    #[test]
    fn user_keeps_username() {
        let user = AuthenticatedUser::new(UserId::new(3), "alice");
        assert_eq!(user.username, "alice");
        assert_eq!(user.id.as_i64(), 3);
    }
}
