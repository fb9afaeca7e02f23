//! Typed configuration for transition conditions, validators and
//! post-functions.
//!
//! Each family is a closed tagged union: the `type` tag selects the
//! evaluator and `config` carries that evaluator's typed settings. On the
//! wire a rule looks like
//! `{"type": "user_in_role", "config": {"role_id": "..."}}`.

use crate::{FieldRef, GroupId, Permission, RoleId, RuleId, StatusId, TransitionId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Conditions ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    UserInRole,
    UserInGroup,
    UserHasPermission,
    OnlyReporter,
    OnlyAssignee,
    SubtasksResolved,
    FieldValue,
}

impl ConditionType {
    pub const ALL: [ConditionType; 7] = [
        ConditionType::UserInRole,
        ConditionType::UserInGroup,
        ConditionType::UserHasPermission,
        ConditionType::OnlyReporter,
        ConditionType::OnlyAssignee,
        ConditionType::SubtasksResolved,
        ConditionType::FieldValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::UserInRole => "user_in_role",
            ConditionType::UserInGroup => "user_in_group",
            ConditionType::UserHasPermission => "user_has_permission",
            ConditionType::OnlyReporter => "only_reporter",
            ConditionType::OnlyAssignee => "only_assignee",
            ConditionType::SubtasksResolved => "subtasks_resolved",
            ConditionType::FieldValue => "field_value",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum ConditionKind {
    UserInRole { role_id: RoleId },
    UserInGroup { group_id: GroupId },
    UserHasPermission { permission: Permission },
    OnlyReporter,
    OnlyAssignee,
    /// Every sub-task sits in a `done`-category status.
    SubtasksResolved,
    FieldValue { field: FieldRef, equals: Value },
}

impl ConditionKind {
    pub fn condition_type(&self) -> ConditionType {
        match self {
            ConditionKind::UserInRole { .. } => ConditionType::UserInRole,
            ConditionKind::UserInGroup { .. } => ConditionType::UserInGroup,
            ConditionKind::UserHasPermission { .. } => ConditionType::UserHasPermission,
            ConditionKind::OnlyReporter => ConditionType::OnlyReporter,
            ConditionKind::OnlyAssignee => ConditionType::OnlyAssignee,
            ConditionKind::SubtasksResolved => ConditionType::SubtasksResolved,
            ConditionKind::FieldValue { .. } => ConditionType::FieldValue,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub id: RuleId,
    pub transition_id: TransitionId,
    #[serde(flatten)]
    pub kind: ConditionKind,
    pub position: i32,
}

impl ConditionRule {
    pub fn new(transition_id: TransitionId, kind: ConditionKind, position: i32) -> Self {
        Self {
            id: RuleId::generate(),
            transition_id,
            kind,
            position,
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorType {
    FieldRequired,
    FieldNotEmpty,
    Regex,
    PreviousStatus,
    ParentStatus,
    Permission,
    CommentRequired,
    ResolutionSet,
}

impl ValidatorType {
    pub const ALL: [ValidatorType; 8] = [
        ValidatorType::FieldRequired,
        ValidatorType::FieldNotEmpty,
        ValidatorType::Regex,
        ValidatorType::PreviousStatus,
        ValidatorType::ParentStatus,
        ValidatorType::Permission,
        ValidatorType::CommentRequired,
        ValidatorType::ResolutionSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorType::FieldRequired => "field_required",
            ValidatorType::FieldNotEmpty => "field_not_empty",
            ValidatorType::Regex => "regex",
            ValidatorType::PreviousStatus => "previous_status",
            ValidatorType::ParentStatus => "parent_status",
            ValidatorType::Permission => "permission",
            ValidatorType::CommentRequired => "comment_required",
            ValidatorType::ResolutionSet => "resolution_set",
        }
    }
}

impl std::fmt::Display for ValidatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum ValidatorKind {
    /// The field was submitted with this transition.
    FieldRequired { field: FieldRef },
    /// The field's effective value after applying the submission is not empty.
    FieldNotEmpty { field: FieldRef },
    Regex { field: FieldRef, pattern: String },
    /// The issue has been in this status at some point before.
    PreviousStatus { status_id: StatusId },
    /// The parent issue, if any, is in one of these statuses.
    ParentStatus { status_ids: Vec<StatusId> },
    Permission { permission: Permission },
    CommentRequired,
    ResolutionSet,
}

impl ValidatorKind {
    pub fn validator_type(&self) -> ValidatorType {
        match self {
            ValidatorKind::FieldRequired { .. } => ValidatorType::FieldRequired,
            ValidatorKind::FieldNotEmpty { .. } => ValidatorType::FieldNotEmpty,
            ValidatorKind::Regex { .. } => ValidatorType::Regex,
            ValidatorKind::PreviousStatus { .. } => ValidatorType::PreviousStatus,
            ValidatorKind::ParentStatus { .. } => ValidatorType::ParentStatus,
            ValidatorKind::Permission { .. } => ValidatorType::Permission,
            ValidatorKind::CommentRequired => ValidatorType::CommentRequired,
            ValidatorKind::ResolutionSet => ValidatorType::ResolutionSet,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRule {
    pub id: RuleId,
    pub transition_id: TransitionId,
    #[serde(flatten)]
    pub kind: ValidatorKind,
    /// Shown to the user instead of the generic message when this fails.
    pub error_message: Option<String>,
    pub position: i32,
}

impl ValidatorRule {
    pub fn new(transition_id: TransitionId, kind: ValidatorKind, position: i32) -> Self {
        Self {
            id: RuleId::generate(),
            transition_id,
            kind,
            error_message: None,
            position,
        }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

// ── Post-functions ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFunctionType {
    UpdateField,
    AssignToReporter,
    AssignToLead,
    ClearField,
    CopyFieldValue,
    AddComment,
    SendNotification,
    TriggerWebhook,
    UpdateParent,
}

impl PostFunctionType {
    pub const ALL: [PostFunctionType; 9] = [
        PostFunctionType::UpdateField,
        PostFunctionType::AssignToReporter,
        PostFunctionType::AssignToLead,
        PostFunctionType::ClearField,
        PostFunctionType::CopyFieldValue,
        PostFunctionType::AddComment,
        PostFunctionType::SendNotification,
        PostFunctionType::TriggerWebhook,
        PostFunctionType::UpdateParent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostFunctionType::UpdateField => "update_field",
            PostFunctionType::AssignToReporter => "assign_to_reporter",
            PostFunctionType::AssignToLead => "assign_to_lead",
            PostFunctionType::ClearField => "clear_field",
            PostFunctionType::CopyFieldValue => "copy_field_value",
            PostFunctionType::AddComment => "add_comment",
            PostFunctionType::SendNotification => "send_notification",
            PostFunctionType::TriggerWebhook => "trigger_webhook",
            PostFunctionType::UpdateParent => "update_parent",
        }
    }
}

impl std::fmt::Display for PostFunctionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which issue `copy_field_value` writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyTarget {
    #[default]
    ThisIssue,
    Parent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Reporter,
    Assignee,
    ProjectLead,
    User { user_id: UserId },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum PostFunctionKind {
    UpdateField {
        field: FieldRef,
        value: Value,
    },
    AssignToReporter,
    AssignToLead,
    ClearField {
        field: FieldRef,
    },
    CopyFieldValue {
        from_field: FieldRef,
        to_field: FieldRef,
        #[serde(default)]
        target: CopyTarget,
    },
    AddComment {
        body: String,
    },
    SendNotification {
        event: String,
        #[serde(default)]
        recipients: Vec<Recipient>,
    },
    TriggerWebhook {
        url: String,
    },
    UpdateParent {
        field: FieldRef,
        value: Value,
    },
}

impl PostFunctionKind {
    pub fn post_function_type(&self) -> PostFunctionType {
        match self {
            PostFunctionKind::UpdateField { .. } => PostFunctionType::UpdateField,
            PostFunctionKind::AssignToReporter => PostFunctionType::AssignToReporter,
            PostFunctionKind::AssignToLead => PostFunctionType::AssignToLead,
            PostFunctionKind::ClearField { .. } => PostFunctionType::ClearField,
            PostFunctionKind::CopyFieldValue { .. } => PostFunctionType::CopyFieldValue,
            PostFunctionKind::AddComment { .. } => PostFunctionType::AddComment,
            PostFunctionKind::SendNotification { .. } => PostFunctionType::SendNotification,
            PostFunctionKind::TriggerWebhook { .. } => PostFunctionType::TriggerWebhook,
            PostFunctionKind::UpdateParent { .. } => PostFunctionType::UpdateParent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostFunctionRule {
    pub id: RuleId,
    pub transition_id: TransitionId,
    #[serde(flatten)]
    pub kind: PostFunctionKind,
    pub position: i32,
}

impl PostFunctionRule {
    pub fn new(transition_id: TransitionId, kind: PostFunctionKind, position: i32) -> Self {
        Self {
            id: RuleId::generate(),
            transition_id,
            kind,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn condition_wire_shape() {
        let rule = ConditionRule::new(
            TransitionId::new("t"),
            ConditionKind::UserInRole {
                role_id: RoleId::new("devs"),
            },
            0,
        );
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "user_in_role");
        assert_eq!(json["config"], json!({"role_id": "devs"}));
        assert_eq!(json["position"], 0);
    }

    #[test]
    fn unit_rules_parse_without_config() {
        let rule: ConditionRule = serde_json::from_value(json!({
            "id": "c1",
            "transition_id": "t",
            "type": "only_reporter",
            "position": 3
        }))
        .unwrap();
        assert_eq!(rule.kind, ConditionKind::OnlyReporter);
        assert_eq!(rule.kind.condition_type().as_str(), "only_reporter");
    }

    #[test]
    fn validator_carries_message() {
        let rule: ValidatorRule = serde_json::from_value(json!({
            "id": "v1",
            "transition_id": "t",
            "type": "regex",
            "config": {
                "field": {"field_type": "standard", "field_name": "summary"},
                "pattern": "^[A-Z]"
            },
            "error_message": "Summary must start with a capital letter",
            "position": 0
        }))
        .unwrap();
        assert_eq!(rule.kind.validator_type(), ValidatorType::Regex);
        assert_eq!(
            rule.error_message.as_deref(),
            Some("Summary must start with a capital letter")
        );
    }

    #[test]
    fn copy_target_defaults_to_this_issue() {
        let kind: PostFunctionKind = serde_json::from_value(json!({
            "type": "copy_field_value",
            "config": {
                "from_field": {"field_type": "custom", "field_id": "a"},
                "to_field": {"field_type": "custom", "field_id": "b"}
            }
        }))
        .unwrap();
        assert!(matches!(
            kind,
            PostFunctionKind::CopyFieldValue {
                target: CopyTarget::ThisIssue,
                ..
            }
        ));
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let result: Result<ConditionKind, _> =
            serde_json::from_value(json!({"type": "moon_phase", "config": {}}));
        assert!(result.is_err());
    }
}
