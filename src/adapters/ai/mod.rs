//! Completion Provider Adapters.
//!
//! - `OpenAiCompatibleProvider` - OpenAI chat completions dialect plus a raw line stream
//! - `MockCompletionProvider` - Scripted mock for testing

mod mock_provider;
mod openai_compatible;

pub use mock_provider::{MockCompletionProvider, MockStream};
pub use openai_compatible::{lines_from_bytes, OpenAiCompatibleProvider};
