//! Token usage reported by providers and the amount charged for it.

use serde::{Deserialize, Serialize};

/// Token counts as reported by a provider. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Usage with only a reported total.
    pub fn total(total: u64) -> Self {
        Self {
            total_tokens: Some(total),
            ..Self::default()
        }
    }

    /// Usage with prompt and completion counts but no total.
    pub fn split(prompt: u64, completion: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt),
            completion_tokens: Some(completion),
            total_tokens: None,
        }
    }

    /// Amount to debit from the quota.
    ///
    /// Prefers a non-zero reported total, then prompt + completion, then
    /// zero. A zero charge is not an error.
    pub fn billable(&self) -> u64 {
        match self.total_tokens {
            Some(total) if total > 0 => total,
            _ => self
                .prompt_tokens
                .unwrap_or(0)
                .saturating_add(self.completion_tokens.unwrap_or(0)),
        }
    }
}
