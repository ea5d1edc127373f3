//! Error types for the rollout advisor.
//!
//! Only faults surface here. "No advice" outcomes (a lookup that comes up
//! empty, an event the engine has nothing to say about) are modelled by
//! [`crate::engine::Advice::NoAdvice`] and never become errors.

use thiserror::Error;

/// Errors surfaced to the executor by the advisor.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// A failure policy carries a repair action the engine does not know.
    #[error("Unexpected repair action: {0}")]
    UnexpectedRepairAction(String),

    /// Topology violates one of its construction invariants.
    #[error("Corrupt topology: {0}")]
    CorruptTopology(String),

    /// Execution state handed over by the executor cannot be interpreted.
    #[error("Corrupt execution state: {0}")]
    CorruptState(String),

    /// Workflow lookup, interrupt query or another read collaborator failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error (YAML)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdvisorError {
    /// Whether the executor should surface this error as an execution-level
    /// error state (as opposed to a publish-time rejection).
    pub fn is_execution_fault(&self) -> bool {
        matches!(
            self,
            AdvisorError::UnexpectedRepairAction(_)
                | AdvisorError::CorruptTopology(_)
                | AdvisorError::CorruptState(_)
                | AdvisorError::Collaborator(_)
        )
    }
}

/// Result type alias using AdvisorError.
pub type AdvisorResult<T> = Result<T, AdvisorError>;

impl From<anyhow::Error> for AdvisorError {
    fn from(err: anyhow::Error) -> Self {
        AdvisorError::Collaborator(err.to_string())
    }
}

impl From<envy::Error> for AdvisorError {
    fn from(err: envy::Error) -> Self {
        AdvisorError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for AdvisorError {
    fn from(err: serde_yaml::Error) -> Self {
        AdvisorError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_action_error() {
        let err = AdvisorError::UnexpectedRepairAction("SELF_DESTRUCT".to_string());
        assert_eq!(err.to_string(), "Unexpected repair action: SELF_DESTRUCT");
        assert!(err.is_execution_fault());
    }

    #[test]
    fn test_collaborator_error_from_anyhow() {
        let err: AdvisorError = anyhow::anyhow!("interrupt store unreachable").into();
        assert!(matches!(err, AdvisorError::Collaborator(_)));
        assert_eq!(err.to_string(), "Collaborator error: interrupt store unreachable");
    }

    #[test]
    fn test_parse_error_is_not_execution_fault() {
        let err = AdvisorError::Parse("bad yaml".to_string());
        assert!(!err.is_execution_fault());
    }
}
