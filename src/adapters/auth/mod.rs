//! Authentication adapters.
//!
//! Implementations of the `SessionValidator` port:
//!
//! - `jwt` - HS256 session tokens issued by the account service
//! - `mock` - Test implementation that accepts registered tokens

mod jwt;
mod mock;

pub use jwt::{JwtSessionValidator, SessionClaims};
pub use mock::MockSessionValidator;
