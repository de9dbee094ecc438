//! Error types for recurrence-engine operations.

use thiserror::Error;

/// Coarse classification of a [`RecurrenceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The text does not match the grammar (bad digits, unknown token, out-of-range value).
    Format,
    /// The text is well formed but contradictory or incomplete.
    Semantic,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    #[error("Inconsistent recurrence rule: {0}")]
    InconsistentRule(String),

    #[error("Incomplete component: {0}")]
    IncompleteComponent(String),

    #[error("Expansion error: {0}")]
    Expansion(String),
}

impl RecurrenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecurrenceError::InvalidDatetime(_)
            | RecurrenceError::InvalidTimezone(_)
            | RecurrenceError::InvalidDuration(_)
            | RecurrenceError::InvalidRule(_)
            | RecurrenceError::InvalidProperty(_) => ErrorKind::Format,
            RecurrenceError::InconsistentRule(_)
            | RecurrenceError::IncompleteComponent(_)
            | RecurrenceError::Expansion(_) => ErrorKind::Semantic,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;
