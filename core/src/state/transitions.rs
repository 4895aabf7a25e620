//! Legal registry status transitions.

use super::types::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

pub struct StateTransition;

impl StateTransition {
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        let is_valid = match (from, to) {
            (TaskStatus::Pending, TaskStatus::Running) => true,
            // A pipeline error before the machine started still lands as failed.
            (TaskStatus::Pending, TaskStatus::Failed) => true,
            (TaskStatus::Running, TaskStatus::Completed) => true,
            (TaskStatus::Running, TaskStatus::Failed) => true,
            // New attempt in a later scheduling pass.
            (TaskStatus::Failed, TaskStatus::Running) => true,
            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    pub fn is_terminal(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl TaskStatus {
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        StateTransition::validate(self, to).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(StateTransition::validate(TaskStatus::Pending, TaskStatus::Running).is_ok());
        assert!(StateTransition::validate(TaskStatus::Running, TaskStatus::Completed).is_ok());
        assert!(StateTransition::validate(TaskStatus::Running, TaskStatus::Failed).is_ok());
        assert!(StateTransition::validate(TaskStatus::Failed, TaskStatus::Running).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(StateTransition::validate(TaskStatus::Pending, TaskStatus::Completed).is_err());
        assert!(StateTransition::validate(TaskStatus::Completed, TaskStatus::Running).is_err());
        assert!(StateTransition::validate(TaskStatus::Completed, TaskStatus::Failed).is_err());
        assert!(StateTransition::validate(TaskStatus::Running, TaskStatus::Running).is_err());
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(StateTransition::is_terminal(TaskStatus::Completed));
        assert!(StateTransition::is_terminal(TaskStatus::Failed));
        assert!(!StateTransition::is_terminal(TaskStatus::Running));
    }
}
