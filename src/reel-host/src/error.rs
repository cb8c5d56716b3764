//! Host state machine error types.

use thiserror::Error;

use crate::state::HostState;

/// Host state machine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The transition is not in the table.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: HostState, to: HostState },

    /// A wait did not observe the state in time.
    #[error("Timed out after {timeout_ms}ms waiting for state {state}")]
    Timeout { state: HostState, timeout_ms: u64 },

    /// The machine went away while a caller was waiting.
    #[error("Wait for state {0} was cancelled")]
    Cancelled(HostState),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for host state operations.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StateError::InvalidTransition {
            from: HostState::Initial,
            to: HostState::Playing,
        };
        assert_eq!(err.to_string(), "Invalid state transition: initial -> playing");

        let err = StateError::Timeout {
            state: HostState::Ready,
            timeout_ms: 50,
        };
        assert!(err.to_string().contains("50ms"));
    }
}
