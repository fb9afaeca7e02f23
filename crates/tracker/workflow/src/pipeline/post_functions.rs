use super::{PipelineContext, PostFunctionAction};
use crate::notify::Notification;
use crate::{TransitionError, WorkflowResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracker_storage::{FieldUpdate, IssueStore, ProjectStore};
use tracker_types::{
    Comment, CopyTarget, FieldRef, IssueRecord, PostFunctionKind, Recipient, StandardField,
    UserId,
};

/// Evaluator for every built-in post-function type.
pub struct BuiltinPostFunctions;

#[async_trait]
impl PostFunctionAction for BuiltinPostFunctions {
    async fn apply(&self, ctx: &mut PipelineContext, kind: &PostFunctionKind) -> WorkflowResult<()> {
        match kind {
            PostFunctionKind::UpdateField { field, value } => {
                write_field(ctx, field.clone(), value.clone()).await
            }
            PostFunctionKind::AssignToReporter => {
                let reporter = ctx.issue.reporter_id.clone();
                write_field(ctx, assignee_field(), Value::String(reporter.0)).await
            }
            PostFunctionKind::AssignToLead => {
                let project = ctx
                    .services
                    .storage
                    .get_project(&ctx.issue.project_id)
                    .await?
                    .ok_or_else(|| {
                        TransitionError::NotFound(format!("project {}", ctx.issue.project_id))
                    })?;
                let lead = project.lead_id.ok_or_else(|| {
                    TransitionError::Misconfigured(format!("project {} has no lead", project.key))
                })?;
                write_field(ctx, assignee_field(), Value::String(lead.0)).await
            }
            PostFunctionKind::ClearField { field } => {
                write_field(ctx, field.clone(), Value::Null).await
            }
            PostFunctionKind::CopyFieldValue {
                from_field,
                to_field,
                target,
            } => {
                let value = ctx.issue.field_value(from_field);
                match target {
                    CopyTarget::ThisIssue => write_field(ctx, to_field.clone(), value).await,
                    CopyTarget::Parent => {
                        let parent = parent_of(ctx).await?;
                        update_issue(ctx, &parent, to_field.clone(), value).await?;
                        Ok(())
                    }
                }
            }
            PostFunctionKind::AddComment { body } => {
                let comment = Comment::new(ctx.issue.id.clone(), ctx.actor.clone(), body.clone());
                ctx.services.storage.add_comment(comment).await?;
                Ok(())
            }
            PostFunctionKind::SendNotification { event, recipients } => {
                let recipients = resolve_recipients(ctx, recipients).await?;
                ctx.services.dispatcher.dispatch(Notification::Event {
                    event: event.clone(),
                    issue_id: ctx.issue.id.clone(),
                    issue_key: ctx.issue.key.clone(),
                    transition_id: ctx.transition.id.clone(),
                    actor: ctx.actor.clone(),
                    recipients,
                })?;
                Ok(())
            }
            PostFunctionKind::TriggerWebhook { url } => {
                ctx.services.dispatcher.dispatch(Notification::Webhook {
                    url: url.clone(),
                    payload: webhook_payload(ctx),
                })?;
                Ok(())
            }
            PostFunctionKind::UpdateParent { field, value } => {
                // Top-level issues have nothing to propagate to.
                if ctx.issue.parent_id.is_none() {
                    return Ok(());
                }
                let parent = parent_of(ctx).await?;
                update_issue(ctx, &parent, field.clone(), value.clone()).await?;
                Ok(())
            }
        }
    }
}

fn assignee_field() -> FieldRef {
    FieldRef::standard(StandardField::Assignee)
}

/// Write one field on the transitioned issue and refresh the context copy.
async fn write_field(ctx: &mut PipelineContext, field: FieldRef, value: Value) -> WorkflowResult<()> {
    let issue_id = ctx.issue.id.clone();
    ctx.issue = ctx
        .services
        .storage
        .update_fields(&issue_id, vec![FieldUpdate::new(field, value)])
        .await?;
    Ok(())
}

async fn update_issue(
    ctx: &PipelineContext,
    issue: &IssueRecord,
    field: FieldRef,
    value: Value,
) -> WorkflowResult<IssueRecord> {
    Ok(ctx
        .services
        .storage
        .update_fields(&issue.id, vec![FieldUpdate::new(field, value)])
        .await?)
}

async fn parent_of(ctx: &PipelineContext) -> WorkflowResult<IssueRecord> {
    let parent_id = ctx.issue.parent_id.as_ref().ok_or_else(|| {
        TransitionError::Misconfigured(format!("issue {} has no parent", ctx.issue.key))
    })?;
    ctx.services
        .storage
        .get_issue(parent_id)
        .await?
        .ok_or_else(|| TransitionError::NotFound(format!("parent issue {}", parent_id)))
}

/// Unset roles (no assignee, no lead) are skipped; duplicates collapse.
async fn resolve_recipients(
    ctx: &PipelineContext,
    recipients: &[Recipient],
) -> WorkflowResult<Vec<UserId>> {
    let mut users = Vec::new();
    for recipient in recipients {
        let user = match recipient {
            Recipient::Reporter => Some(ctx.issue.reporter_id.clone()),
            Recipient::Assignee => ctx.issue.assignee_id.clone(),
            Recipient::ProjectLead => ctx
                .services
                .storage
                .get_project(&ctx.issue.project_id)
                .await?
                .and_then(|project| project.lead_id),
            Recipient::User { user_id } => Some(user_id.clone()),
        };
        if let Some(user) = user {
            if !users.contains(&user) {
                users.push(user);
            }
        }
    }
    Ok(users)
}

fn webhook_payload(ctx: &PipelineContext) -> Value {
    json!({
        "event": "issue_transitioned",
        "issue_id": ctx.issue.id,
        "issue_key": ctx.issue.key,
        "transition_id": ctx.transition.id,
        "transition": ctx.transition.name,
        "from_status": ctx.transition.from_status,
        "to_status": ctx.transition.to_status,
        "actor": ctx.actor,
    })
}
