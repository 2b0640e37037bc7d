//! Conversation entity and its lifecycle status.
//!
//! A conversation is never physically removed. Deleting it moves the
//! status to `Deleted`, after which sends and history reads treat it as
//! missing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    ConversationId, StateMachine, Timestamp, UserId, ValidationError,
};

/// Model name recorded when no completion provider is configured.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    #[default]
    Active,
    Deleted,
}

impl ConversationStatus {
    /// Stored / API representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "ACTIVE",
            ConversationStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ConversationStatus::Active),
            "DELETED" => Ok(ConversationStatus::Deleted),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown conversation status '{}'", other),
            )),
        }
    }
}

impl StateMachine for ConversationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (ConversationStatus::Active, ConversationStatus::Deleted)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            ConversationStatus::Active => vec![ConversationStatus::Deleted],
            ConversationStatus::Deleted => vec![],
        }
    }
}

/// A stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub status: ConversationStatus,
    /// Model identifier the conversation was created against.
    pub llm_model: String,
    /// Optional reference to a prompt preset.
    pub system_prompt: Option<i64>,
    pub created_at: Timestamp,
}

impl Conversation {
    /// Returns true if the conversation accepts new turns.
    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// Returns true if `user_id` owns this conversation.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

/// Values needed to create a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub user_id: UserId,
    pub title: String,
    pub llm_model: String,
    pub system_prompt: Option<i64>,
}

impl NewConversation {
    /// Validates the title and builds the creation request.
    ///
    /// A non-numeric prompt reference is dropped rather than rejected.
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        llm_model: impl Into<String>,
        system_prompt: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::empty_field("title"));
        }
        let llm_model = llm_model.into();
        let llm_model = if llm_model.trim().is_empty() {
            UNKNOWN_MODEL.to_string()
        } else {
            llm_model
        };
        Ok(Self {
            user_id,
            title,
            llm_model,
            system_prompt: system_prompt.and_then(|s| s.trim().parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(status: ConversationStatus) -> Conversation {
        Conversation {
            id: ConversationId::new(42),
            user_id: UserId::new(1),
            title: "Trip".to_string(),
            status,
            llm_model: "m".to_string(),
            system_prompt: None,
            created_at: Timestamp::now(),
        }
    }

    mod status {
        use super::*;

        #[test]
        fn parses_stored_values() {
            assert_eq!("ACTIVE".parse::<ConversationStatus>().unwrap(), ConversationStatus::Active);
            assert_eq!("deleted".parse::<ConversationStatus>().unwrap(), ConversationStatus::Deleted);
            assert!("ARCHIVED".parse::<ConversationStatus>().is_err());
        }

        #[test]
        fn delete_is_one_way() {
            assert!(ConversationStatus::Active
                .transition_to(ConversationStatus::Deleted)
                .is_ok());
            assert!(ConversationStatus::Deleted
                .transition_to(ConversationStatus::Active)
                .is_err());
            assert!(ConversationStatus::Deleted.is_terminal());
        }

        #[test]
        fn serializes_screaming_case() {
            let json = serde_json::to_string(&ConversationStatus::Deleted).unwrap();
            assert_eq!(json, "\"DELETED\"");
        }
    }

    mod conversation {
        use super::*;

        #[test]
        fn deleted_conversation_is_not_active() {
            assert!(conversation(ConversationStatus::Active).is_active());
            assert!(!conversation(ConversationStatus::Deleted).is_active());
        }

        #[test]
        fn ownership_checks_user() {
            let conv = conversation(ConversationStatus::Active);
            assert!(conv.is_owned_by(UserId::new(1)));
            assert!(!conv.is_owned_by(UserId::new(2)));
        }
    }

    mod new_conversation {
        use super::*;

        #[test]
        fn rejects_blank_title() {
            let result = NewConversation::new(UserId::new(1), "   ", "m", None);
            assert!(result.is_err());
        }

        #[test]
        fn numeric_prompt_reference_is_kept() {
            let conv = NewConversation::new(UserId::new(1), "t", "m", Some("17")).unwrap();
            assert_eq!(conv.system_prompt, Some(17));
        }

        #[test]
        fn non_numeric_prompt_reference_is_dropped() {
            let conv = NewConversation::new(UserId::new(1), "t", "m", Some("friendly")).unwrap();
            assert_eq!(conv.system_prompt, None);
        }

        #[test]
        fn blank_model_becomes_unknown() {
            let conv = NewConversation::new(UserId::new(1), "t", "", None).unwrap();
            assert_eq!(conv.llm_model, UNKNOWN_MODEL);
        }
    }
}
