use crate::validation::ValidationReport;
use thiserror::Error;

/// Failure of a single call against the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Status code reported by the store, if the request reached it.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Whether repeating the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::rejected(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that abort a session operation as a whole.
///
/// Per-operation remote failures during a save are never reported through
/// this type; they are collected into the save results instead.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_transience() {
        let throttled = StoreError::rejected(429, "slow down");
        assert_eq!(throttled.status(), Some(429));
        assert!(throttled.is_transient());

        let bad_request = StoreError::rejected(400, "hex invalid");
        assert!(!bad_request.is_transient());

        let missing = StoreError::NotFound("colors/9".to_string());
        assert_eq!(missing.status(), Some(404));
        assert!(StoreError::Transport("reset".to_string()).is_transient());
    }

    #[test]
    fn test_display() {
        let err = StoreError::rejected(409, "position taken");
        assert_eq!(err.to_string(), "Request rejected (409): position taken");
    }
}
