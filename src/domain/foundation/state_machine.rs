//! State machine trait for lifecycle enums.
//!
//! Used by conversation status (ACTIVE → DELETED) and by the streaming
//! relay state (INIT → STREAMING | MOCK_STREAMING → DONE).

use super::ValidationError;

/// Trait for enums whose values form a transition graph.
///
/// Implementors list the legal edges; `transition_to` then refuses
/// anything else.
///
/// ```ignore
/// let next = StreamState::Init.transition_to(StreamState::Streaming)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Off,
        On,
        Broken,
    }

    impl StateMachine for Light {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Light::Off => vec![Light::On, Light::Broken],
                Light::On => vec![Light::Off, Light::Broken],
                Light::Broken => vec![],
            }
        }
    }

    #[test]
    fn legal_transition_returns_target() {
        assert_eq!(Light::Off.transition_to(Light::On).unwrap(), Light::On);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let err = Light::Broken.transition_to(Light::On).unwrap_err();
        assert!(err.to_string().contains("Cannot transition from Broken to On"));
    }

    #[test]
    fn state_without_edges_is_terminal() {
        assert!(Light::Broken.is_terminal());
        assert!(!Light::Off.is_terminal());
    }
}
