//! Error types for the agenda core.

use thiserror::Error;

/// Errors that can occur in agenda operations.
///
/// `Clone` so a single failed load can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgendaError {
    #[error("Invalid instant: {0}")]
    InvalidInstant(String),

    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Event store error: {0}")]
    Store(String),

    #[error("Unknown edit action '{0}' (expected update, delete or complete)")]
    UnknownAction(String),

    #[error("Unknown edit scope '{0}' (expected this, future or all)")]
    UnknownScope(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgendaError {
    /// Wrap a store client's error.
    pub fn store(e: impl std::fmt::Display) -> Self {
        AgendaError::Store(e.to_string())
    }
}

/// Result type alias for agenda operations.
pub type AgendaResult<T> = Result<T, AgendaError>;
