use crate::notify::DispatchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracker_access::AccessError;
use tracker_storage::StorageError;
use tracker_types::{ConditionType, PostFunctionType, StatusId};

pub type WorkflowResult<T> = Result<T, TransitionError>;

/// Why a transition attempt was turned away. Client errors, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionRejection {
    /// No edge from the issue's status, or the status moved underneath us.
    #[error("no transition from status {from_status} to {to_status}")]
    NoSuchTransition {
        from_status: StatusId,
        to_status: StatusId,
    },

    #[error("condition {condition_type} at position {position} was not met")]
    ConditionNotMet {
        condition_type: ConditionType,
        position: i32,
    },

    /// `validator` is the validator type tag, or `screen_required`.
    #[error("{validator}: {message}")]
    ValidationFailed { validator: String, message: String },
}

impl TransitionRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            TransitionRejection::NoSuchTransition { .. } => "no_such_transition",
            TransitionRejection::ConditionNotMet { .. } => "condition_not_met",
            TransitionRejection::ValidationFailed { .. } => "validation_failed",
        }
    }
}

/// A post-function that failed after the status change committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFunctionWarning {
    pub post_function_type: PostFunctionType,
    pub position: i32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transition rejected: {0}")]
    Rejected(TransitionRejection),

    /// A pipeline rule whose configuration cannot be evaluated, or a type
    /// tag with no registered evaluator.
    #[error("misconfigured pipeline: {0}")]
    Misconfigured(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("permission check failed: {0}")]
    Access(#[from] AccessError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl TransitionError {
    pub fn rejected(rejection: TransitionRejection) -> Self {
        TransitionError::Rejected(rejection)
    }

    pub fn rejection(&self) -> Option<&TransitionRejection> {
        match self {
            TransitionError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Message safe to show an end user. Rejections name the failing rule;
    /// faults stay generic.
    pub fn user_message(&self) -> String {
        match self {
            TransitionError::NotFound(what) => format!("{what} not found"),
            TransitionError::Rejected(rejection) => rejection.to_string(),
            TransitionError::Misconfigured(_) => "workflow is misconfigured".to_string(),
            TransitionError::Access(err) => err.user_message(),
            TransitionError::Storage(_) | TransitionError::Dispatch(_) => {
                "internal storage error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reasons_are_stable() {
        let rejection = TransitionRejection::ConditionNotMet {
            condition_type: ConditionType::OnlyAssignee,
            position: 2,
        };
        assert_eq!(rejection.reason(), "condition_not_met");
        assert_eq!(
            rejection.to_string(),
            "condition only_assignee at position 2 was not met"
        );
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(json["reason"], "condition_not_met");
    }

    #[test]
    fn storage_faults_do_not_leak_detail() {
        let err = TransitionError::from(StorageError::Backend("disk on fire".into()));
        assert_eq!(err.user_message(), "internal storage error");
        assert!(err.rejection().is_none());
    }
}
