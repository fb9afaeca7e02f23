use thiserror::Error;
use tracker_storage::StorageError;

pub type AccessResult<T> = Result<T, AccessError>;

/// Authorization failures.
///
/// `PermissionDenied` is the resolver's deliberate "no". `Resolution` means
/// no answer could be reached; callers must deny the request but report it
/// as a failed check, never as a denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("permission denied: {permission}")]
    PermissionDenied { permission: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to check permissions: {0}")]
    Resolution(#[from] StorageError),
}

impl AccessError {
    pub fn denied(permission: impl std::fmt::Display) -> Self {
        AccessError::PermissionDenied {
            permission: permission.to_string(),
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessError::PermissionDenied { .. })
    }

    /// Message safe to show an end user. Storage detail is not leaked.
    pub fn user_message(&self) -> String {
        match self {
            AccessError::PermissionDenied { permission } => {
                format!("permission denied: {permission} is required")
            }
            AccessError::NotFound(what) => format!("{what} not found"),
            AccessError::Resolution(_) => "failed to check permissions".to_string(),
        }
    }
}
