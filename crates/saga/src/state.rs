//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Validating ──┬──► Rejected
///              └──► Mutating ──┬──► Committed
///                              └──► RollingBack ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Sequential fail-fast checks are running; nothing written yet.
    #[default]
    Validating,

    /// Forward mutations are being applied.
    Mutating,

    /// A check failed before any mutation (terminal state).
    Rejected,

    /// All mutations applied and the undo ledger discarded (terminal state).
    Committed,

    /// A mutation failed and recorded compensations are running in reverse.
    RollingBack,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if the saga can begin its mutation phase.
    pub fn can_mutate(&self) -> bool {
        matches!(self, SagaState::Validating)
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_roll_back(&self) -> bool {
        matches!(self, SagaState::Mutating)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Rejected | SagaState::Committed | SagaState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Validating => "Validating",
            SagaState::Mutating => "Mutating",
            SagaState::Rejected => "Rejected",
            SagaState::Committed => "Committed",
            SagaState::RollingBack => "RollingBack",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_validating() {
        assert_eq!(SagaState::default(), SagaState::Validating);
    }

    #[test]
    fn can_mutate() {
        assert!(SagaState::Validating.can_mutate());
        assert!(!SagaState::Mutating.can_mutate());
        assert!(!SagaState::Rejected.can_mutate());
        assert!(!SagaState::Committed.can_mutate());
        assert!(!SagaState::RollingBack.can_mutate());
        assert!(!SagaState::Failed.can_mutate());
    }

    #[test]
    fn can_roll_back() {
        assert!(!SagaState::Validating.can_roll_back());
        assert!(SagaState::Mutating.can_roll_back());
        assert!(!SagaState::RollingBack.can_roll_back());
        assert!(!SagaState::Committed.can_roll_back());
    }

    #[test]
    fn terminal_states() {
        assert!(!SagaState::Validating.is_terminal());
        assert!(!SagaState::Mutating.is_terminal());
        assert!(!SagaState::RollingBack.is_terminal());
        assert!(SagaState::Rejected.is_terminal());
        assert!(SagaState::Committed.is_terminal());
        assert!(SagaState::Failed.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(SagaState::Validating.to_string(), "Validating");
        assert_eq!(SagaState::RollingBack.to_string(), "RollingBack");
    }
}
