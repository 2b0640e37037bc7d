//! Account query handlers.

mod get_account;

pub use get_account::GetAccountHandler;
