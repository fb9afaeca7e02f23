//! Issue records and field addressing.
//!
//! Standard fields live in typed columns; custom fields are a JSON map keyed
//! by custom field id. [`FieldRef`] addresses either kind uniformly so that
//! validators, screens and post-functions can be configured without code.

use crate::{
    CommentId, CustomFieldId, IssueId, IssueTypeId, ParseError, ProjectId, StatusId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Built-in issue fields addressable from workflow configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardField {
    Summary,
    Description,
    Priority,
    Assignee,
    Reporter,
    Resolution,
    DueDate,
    Labels,
}

impl StandardField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardField::Summary => "summary",
            StandardField::Description => "description",
            StandardField::Priority => "priority",
            StandardField::Assignee => "assignee",
            StandardField::Reporter => "reporter",
            StandardField::Resolution => "resolution",
            StandardField::DueDate => "due_date",
            StandardField::Labels => "labels",
        }
    }
}

impl FromStr for StandardField {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "summary" => Ok(StandardField::Summary),
            "description" => Ok(StandardField::Description),
            "priority" => Ok(StandardField::Priority),
            "assignee" => Ok(StandardField::Assignee),
            "reporter" => Ok(StandardField::Reporter),
            "resolution" => Ok(StandardField::Resolution),
            "due_date" => Ok(StandardField::DueDate),
            "labels" => Ok(StandardField::Labels),
            other => Err(ParseError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "field_type", rename_all = "snake_case")]
pub enum FieldRef {
    Standard { field_name: StandardField },
    Custom { field_id: CustomFieldId },
}

impl FieldRef {
    pub fn standard(field: StandardField) -> Self {
        FieldRef::Standard { field_name: field }
    }

    pub fn custom(field_id: impl Into<String>) -> Self {
        FieldRef::Custom {
            field_id: CustomFieldId::new(field_id),
        }
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRef::Standard { field_name } => f.write_str(field_name.as_str()),
            FieldRef::Custom { field_id } => write!(f, "custom:{}", field_id),
        }
    }
}

/// Treats null, blank strings and empty collections as "not filled in".
pub fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: IssueId,
    pub key: String,
    pub project_id: ProjectId,
    pub issue_type_id: IssueTypeId,
    pub status_id: StatusId,
    pub parent_id: Option<IssueId>,
    pub summary: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub reporter_id: UserId,
    pub assignee_id: Option<UserId>,
    pub resolution: Option<String>,
    pub due_date: Option<String>,
    pub labels: Vec<String>,
    pub custom_fields: BTreeMap<CustomFieldId, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssueRecord {
    pub fn new(
        key: impl Into<String>,
        project_id: ProjectId,
        issue_type_id: IssueTypeId,
        status_id: StatusId,
        reporter_id: UserId,
        summary: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: IssueId::generate(),
            key: key.into(),
            project_id,
            issue_type_id,
            status_id,
            parent_id: None,
            summary: summary.into(),
            description: None,
            priority: None,
            reporter_id,
            assignee_id: None,
            resolution: None,
            due_date: None,
            labels: Vec::new(),
            custom_fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parent(mut self, parent_id: IssueId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_assignee(mut self, assignee_id: UserId) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    /// Current value of a field as JSON. Unset fields read as `Null`.
    pub fn field_value(&self, field: &FieldRef) -> Value {
        match field {
            FieldRef::Standard { field_name } => match field_name {
                StandardField::Summary => Value::String(self.summary.clone()),
                StandardField::Description => opt_string(&self.description),
                StandardField::Priority => opt_string(&self.priority),
                StandardField::Assignee => {
                    opt_string(&self.assignee_id.as_ref().map(|id| id.0.clone()))
                }
                StandardField::Reporter => Value::String(self.reporter_id.0.clone()),
                StandardField::Resolution => opt_string(&self.resolution),
                StandardField::DueDate => opt_string(&self.due_date),
                StandardField::Labels => Value::Array(
                    self.labels
                        .iter()
                        .map(|label| Value::String(label.clone()))
                        .collect(),
                ),
            },
            FieldRef::Custom { field_id } => self
                .custom_fields
                .get(field_id)
                .cloned()
                .unwrap_or(Value::Null),
        }
    }

    /// Write a field. `Null` clears optional fields; required standard
    /// fields (summary, reporter) reject it.
    pub fn set_field(&mut self, field: &FieldRef, value: Value) -> Result<(), ParseError> {
        match field {
            FieldRef::Standard { field_name } => match field_name {
                StandardField::Summary => {
                    self.summary = required_string(*field_name, value)?;
                }
                StandardField::Description => {
                    self.description = optional_string(*field_name, value)?;
                }
                StandardField::Priority => {
                    self.priority = optional_string(*field_name, value)?;
                }
                StandardField::Assignee => {
                    self.assignee_id = optional_string(*field_name, value)?.map(UserId::new);
                }
                StandardField::Reporter => {
                    self.reporter_id = UserId::new(required_string(*field_name, value)?);
                }
                StandardField::Resolution => {
                    self.resolution = optional_string(*field_name, value)?;
                }
                StandardField::DueDate => {
                    self.due_date = optional_string(*field_name, value)?;
                }
                StandardField::Labels => {
                    self.labels = match value {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items
                            .into_iter()
                            .map(|item| match item {
                                Value::String(label) => Ok(label),
                                other => Err(type_mismatch(*field_name, &other)),
                            })
                            .collect::<Result<_, _>>()?,
                        other => return Err(type_mismatch(*field_name, &other)),
                    };
                }
            },
            FieldRef::Custom { field_id } => {
                if value.is_null() {
                    self.custom_fields.remove(field_id);
                } else {
                    self.custom_fields.insert(field_id.clone(), value);
                }
            }
        }
        Ok(())
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn required_string(field: StandardField, value: Value) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(type_mismatch(field, &other)),
    }
}

fn optional_string(field: StandardField, value: Value) -> Result<Option<String>, ParseError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(type_mismatch(field, &other)),
    }
}

fn type_mismatch(field: StandardField, value: &Value) -> ParseError {
    ParseError::FieldType {
        field: field.as_str().to_string(),
        found: value.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(issue_id: IssueId, author_id: UserId, body: impl Into<String>) -> Self {
        Self {
            id: CommentId::generate(),
            issue_id,
            author_id,
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// One entry of an issue's status history. `from_status` is `None` for the
/// entry written at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub issue_id: IssueId,
    pub from_status: Option<StatusId>,
    pub to_status: StatusId,
    pub changed_by: UserId,
    pub changed_at: DateTime<Utc>,
}
