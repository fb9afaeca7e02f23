use super::{PipelineContext, ValidatorCheck, Verdict};
use crate::{TransitionError, WorkflowResult};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracker_storage::IssueStore;
use tracker_types::{value_is_empty, ValidatorKind};

/// Evaluator for every built-in validator type.
pub struct BuiltinValidators;

#[async_trait]
impl ValidatorCheck for BuiltinValidators {
    async fn validate(
        &self,
        ctx: &PipelineContext,
        kind: &ValidatorKind,
    ) -> WorkflowResult<Verdict> {
        let issue = &ctx.issue;
        let input = &ctx.input;
        let services = &ctx.services;
        match kind {
            ValidatorKind::FieldRequired { field } => Ok(Verdict::check(
                input.submitted(field).is_some_and(|v| !value_is_empty(v)),
                || format!("{field} is required"),
            )),
            ValidatorKind::FieldNotEmpty { field } => Ok(Verdict::check(
                !value_is_empty(&input.effective_value(issue, field)),
                || format!("{field} must not be empty"),
            )),
            ValidatorKind::Regex { field, pattern } => {
                let regex = Regex::new(pattern).map_err(|e| {
                    TransitionError::Misconfigured(format!("invalid pattern for {field}: {e}"))
                })?;
                let text = match input.effective_value(issue, field) {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                Ok(Verdict::check(regex.is_match(&text), || {
                    format!("{field} does not match {pattern}")
                }))
            }
            ValidatorKind::PreviousStatus { status_id } => {
                let history = services.storage.status_history(&issue.id).await?;
                Ok(Verdict::check(
                    history.iter().any(|change| &change.to_status == status_id),
                    || format!("issue has never been in status {status_id}"),
                ))
            }
            ValidatorKind::ParentStatus { status_ids } => {
                let Some(parent_id) = &issue.parent_id else {
                    return Ok(Verdict::Pass);
                };
                let parent = services
                    .storage
                    .get_issue(parent_id)
                    .await?
                    .ok_or_else(|| TransitionError::NotFound(format!("parent issue {parent_id}")))?;
                Ok(Verdict::check(status_ids.contains(&parent.status_id), || {
                    format!("parent issue {} is not in an allowed status", parent.key)
                }))
            }
            ValidatorKind::Permission { permission } => {
                let held = services
                    .resolver
                    .has_project_permission(&ctx.actor, &issue.project_id, *permission)
                    .await?;
                Ok(Verdict::check(held, || {
                    format!("{permission} permission is required")
                }))
            }
            ValidatorKind::CommentRequired => Ok(Verdict::check(
                input.comment_text().is_some(),
                || "a comment is required".to_string(),
            )),
            ValidatorKind::ResolutionSet => Ok(Verdict::check(
                input.resolution_text().is_some() || issue.resolution.is_some(),
                || "a resolution is required".to_string(),
            )),
        }
    }
}
