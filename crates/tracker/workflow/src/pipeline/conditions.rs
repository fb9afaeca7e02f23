use super::{ConditionCheck, PipelineContext};
use crate::WorkflowResult;
use async_trait::async_trait;
use tracker_storage::{DirectoryStore, IssueStore, WorkflowStore};
use tracker_types::{ConditionKind, StatusCategory};

/// Evaluator for every built-in condition type.
pub struct BuiltinConditions;

#[async_trait]
impl ConditionCheck for BuiltinConditions {
    async fn check(&self, ctx: &PipelineContext, kind: &ConditionKind) -> WorkflowResult<bool> {
        let issue = &ctx.issue;
        let services = &ctx.services;
        match kind {
            ConditionKind::UserInRole { role_id } => Ok(services
                .roles()
                .is_user_in_role(&issue.project_id, role_id, &ctx.actor)
                .await?),
            ConditionKind::UserInGroup { group_id } => Ok(services
                .storage
                .list_groups_for_user(&ctx.actor)
                .await?
                .contains(group_id)),
            ConditionKind::UserHasPermission { permission } => Ok(services
                .resolver
                .has_project_permission(&ctx.actor, &issue.project_id, *permission)
                .await?),
            ConditionKind::OnlyReporter => Ok(issue.reporter_id == ctx.actor),
            ConditionKind::OnlyAssignee => Ok(issue.assignee_id.as_ref() == Some(&ctx.actor)),
            ConditionKind::SubtasksResolved => {
                for subtask in services.storage.list_subtasks(&issue.id).await? {
                    let done = services
                        .storage
                        .get_status(&subtask.status_id)
                        .await?
                        .map(|status| status.category == StatusCategory::Done)
                        .unwrap_or(false);
                    if !done {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionKind::FieldValue { field, equals } => Ok(&issue.field_value(field) == equals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{add_subtask, harness};
    use serde_json::json;
    use tracker_storage::RoleStore;
    use tracker_types::{
        Actor, FieldRef, Group, ProjectRole, StandardField, Status, UserId, Workflow,
    };

    #[tokio::test]
    async fn reporter_and_assignee() {
        let mut h = harness().await;
        let check = BuiltinConditions;
        assert!(!check.check(&h.ctx, &ConditionKind::OnlyReporter).await.unwrap());
        assert!(!check.check(&h.ctx, &ConditionKind::OnlyAssignee).await.unwrap());

        h.ctx.actor = UserId::new("reporter");
        assert!(check.check(&h.ctx, &ConditionKind::OnlyReporter).await.unwrap());

        h.ctx.issue.assignee_id = Some(UserId::new("reporter"));
        assert!(check.check(&h.ctx, &ConditionKind::OnlyAssignee).await.unwrap());
    }

    #[tokio::test]
    async fn role_and_group_membership() {
        let h = harness().await;
        let group = Group::new("qa");
        let group_id = group.id.clone();
        h.storage.create_group(group).await.unwrap();
        let role = ProjectRole::new("Testers");
        let role_id = role.id.clone();
        h.storage.create_project_role(role).await.unwrap();
        h.storage
            .add_role_actor(&h.ctx.issue.project_id, &role_id, Actor::Group(group_id.clone()))
            .await
            .unwrap();

        let in_role = ConditionKind::UserInRole { role_id };
        let in_group = ConditionKind::UserInGroup { group_id: group_id.clone() };
        assert!(!BuiltinConditions.check(&h.ctx, &in_role).await.unwrap());
        assert!(!BuiltinConditions.check(&h.ctx, &in_group).await.unwrap());

        h.storage.add_group_member(&group_id, &h.ctx.actor).await.unwrap();
        assert!(BuiltinConditions.check(&h.ctx, &in_role).await.unwrap());
        assert!(BuiltinConditions.check(&h.ctx, &in_group).await.unwrap());
    }

    #[tokio::test]
    async fn subtasks_must_all_be_done() {
        let h = harness().await;
        let workflow = Workflow::new("Sub-tasks");
        let workflow_id = workflow.id.clone();
        h.storage.create_workflow(workflow).await.unwrap();
        let open = Status::new(workflow_id.clone(), "Open", StatusCategory::Todo, 0);
        let done = Status::new(workflow_id, "Done", StatusCategory::Done, 1);
        let (open_id, done_id) = (open.id.clone(), done.id.clone());
        h.storage.upsert_status(open).await.unwrap();
        h.storage.upsert_status(done).await.unwrap();

        // No sub-tasks at all passes.
        assert!(BuiltinConditions
            .check(&h.ctx, &ConditionKind::SubtasksResolved)
            .await
            .unwrap());

        add_subtask(&h, "TRK-2", &done_id).await;
        add_subtask(&h, "TRK-3", &open_id).await;
        assert!(!BuiltinConditions
            .check(&h.ctx, &ConditionKind::SubtasksResolved)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn field_value_compares_current_value() {
        let mut h = harness().await;
        let kind = ConditionKind::FieldValue {
            field: FieldRef::standard(StandardField::Priority),
            equals: json!("High"),
        };
        assert!(!BuiltinConditions.check(&h.ctx, &kind).await.unwrap());
        h.ctx.issue.priority = Some("High".to_string());
        assert!(BuiltinConditions.check(&h.ctx, &kind).await.unwrap());
    }
}
