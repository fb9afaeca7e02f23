use thiserror::Error;
use tracker_access::AccessError;
use tracker_storage::StorageError;
use tracker_workflow::{TransitionError, TransitionRejection};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {permission}")]
    PermissionDenied { permission: String },

    /// The resolver could not reach an answer. The request is refused.
    #[error("permission check failed: {0}")]
    PermissionCheckFailed(AccessError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::PermissionDenied { permission } => {
                ServiceError::PermissionDenied { permission }
            }
            AccessError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::PermissionCheckFailed(other),
        }
    }
}

impl ServiceError {
    pub fn rejection(&self) -> Option<&TransitionRejection> {
        match self {
            ServiceError::Transition(err) => err.rejection(),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ServiceError::NotFound(what) => format!("{what} not found"),
            ServiceError::PermissionDenied { permission } => {
                format!("permission denied: {permission} is required")
            }
            ServiceError::PermissionCheckFailed(_) => "failed to check permissions".to_string(),
            ServiceError::Transition(err) => err.user_message(),
            ServiceError::Storage(_) => "internal storage error".to_string(),
        }
    }
}
