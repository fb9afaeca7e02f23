use thiserror::Error;
use tracker_types::{IssueId, StatusId};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Compare-and-swap on an issue's status lost against a concurrent write.
    #[error("issue {issue_id} status changed: expected {expected}, found {actual}")]
    StatusMismatch {
        issue_id: IssueId,
        expected: StatusId,
        actual: StatusId,
    },

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
