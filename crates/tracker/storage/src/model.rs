use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracker_types::{FieldRef, IssueId, StatusId, UserId};

/// A single field write applied to an issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: FieldRef,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new(field: FieldRef, value: Value) -> Self {
        Self { field, value }
    }
}

/// Everything written atomically when a transition commits.
///
/// The commit only applies if the issue's status still equals
/// `expected_status`; otherwise the store answers
/// [`StorageError::StatusMismatch`](crate::StorageError::StatusMismatch)
/// and nothing is written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionCommit {
    pub issue_id: IssueId,
    pub expected_status: StatusId,
    pub new_status: StatusId,
    pub actor: UserId,
    pub field_updates: Vec<FieldUpdate>,
    pub resolution: Option<String>,
    pub comment: Option<String>,
    pub committed_at: DateTime<Utc>,
}
