//! Workflow graphs, screens and workflow schemes.

use crate::{
    FieldRef, IssueTypeId, ParseError, ScreenId, StatusId, TransitionId, WorkflowId,
    WorkflowSchemeId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A named status graph. Statuses and transitions are stored as rows owned
/// by the workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            description: None,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Todo,
    InProgress,
    Done,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Todo => "todo",
            StatusCategory::InProgress => "in_progress",
            StatusCategory::Done => "done",
        }
    }
}

impl FromStr for StatusCategory {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "todo" => Ok(StatusCategory::Todo),
            "in_progress" => Ok(StatusCategory::InProgress),
            "done" => Ok(StatusCategory::Done),
            other => Err(ParseError::UnknownStatusCategory(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub category: StatusCategory,
    pub position: i32,
}

impl Status {
    pub fn new(
        workflow_id: WorkflowId,
        name: impl Into<String>,
        category: StatusCategory,
        position: i32,
    ) -> Self {
        Self {
            id: StatusId::generate(),
            workflow_id,
            name: name.into(),
            category,
            position,
        }
    }

    /// Terminal statuses may still have outgoing edges; closure is up to
    /// the workflow designer.
    pub fn is_terminal(&self) -> bool {
        self.category == StatusCategory::Done
    }
}

/// Directed edge between two statuses of one workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub workflow_id: WorkflowId,
    pub from_status: StatusId,
    pub to_status: StatusId,
    pub name: String,
    pub screen_id: Option<ScreenId>,
}

/// Input for the transition upsert. The id is assigned by the store on
/// first insert and kept on later upserts of the same edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDraft {
    pub workflow_id: WorkflowId,
    pub from_status: StatusId,
    pub to_status: StatusId,
    pub name: String,
    pub screen_id: Option<ScreenId>,
}

impl TransitionDraft {
    pub fn new(
        workflow_id: WorkflowId,
        from_status: StatusId,
        to_status: StatusId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id,
            from_status,
            to_status,
            name: name.into(),
            screen_id: None,
        }
    }

    pub fn with_screen(mut self, screen_id: ScreenId) -> Self {
        self.screen_id = Some(screen_id);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,
    pub name: String,
    pub description: Option<String>,
}

impl Screen {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ScreenId::generate(),
            name: name.into(),
            description: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenField {
    pub screen_id: ScreenId,
    pub field: FieldRef,
    pub is_required: bool,
    pub position: i32,
}

/// Maps issue types to workflows for every project that uses it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowScheme {
    pub id: WorkflowSchemeId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowSchemeId::generate(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }
}

/// A `None` issue type marks the scheme's default mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeMapping {
    pub scheme_id: WorkflowSchemeId,
    pub issue_type_id: Option<IssueTypeId>,
    pub workflow_id: WorkflowId,
}

impl SchemeMapping {
    pub fn is_default(&self) -> bool {
        self.issue_type_id.is_none()
    }
}
