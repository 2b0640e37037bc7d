//! Session validation port for JWT token validation.
//!
//! Token issuance lives outside this service. This port only answers
//! "who is calling": implementations exist for HS256 session tokens and for
//! tests.

use async_trait::async_trait;

use crate::domain::foundation::{AuthenticatedUser, AuthError};

/// Validates access tokens and extracts user identity.
///
/// This is the primary port for authentication. HTTP middleware uses this
/// to validate Bearer tokens and extract the authenticated user.
///
/// # Contract
///
/// Implementations must:
/// - Validate the token signature and expiry
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` when the validator itself is unusable
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a JWT access token and return the authenticated user.
    ///
    /// # Arguments
    ///
    /// * `token` - The raw JWT token (without "Bearer " prefix)
    ///
    /// # Returns
    ///
    /// * `Ok(AuthenticatedUser)` - Token is valid, user extracted from claims
    /// * `Err(AuthError::InvalidToken)` - Token is malformed or signature invalid
    /// * `Err(AuthError::TokenExpired)` - Token signature valid but expired
    /// * `Err(AuthError::ServiceUnavailable)` - Validator misconfigured
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
