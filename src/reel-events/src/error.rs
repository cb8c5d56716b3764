//! Event bus error types.

use thiserror::Error;

/// Event bus errors.
#[derive(Error, Debug)]
pub enum EventError {
    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for event bus operations.
pub type Result<T> = std::result::Result<T, EventError>;
