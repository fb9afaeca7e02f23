//! Workflow Definition & Scheme lookups.

use crate::{TransitionError, WorkflowResult};
use std::sync::Arc;
use tracker_storage::{InMemoryTrackerStorage, ProjectStore, TrackerStorage, WorkflowStore};
use tracker_types::{
    ConditionRule, IssueTypeId, PostFunctionRule, ProjectId, SchemeMapping, Screen, ScreenField,
    Status, StatusId, Transition, TransitionId, ValidatorRule, Workflow, WorkflowId,
    WorkflowSchemeId,
};

/// A transition with everything attached to it, each list in ascending
/// position order.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionPipeline {
    pub transition: Transition,
    pub conditions: Vec<ConditionRule>,
    pub validators: Vec<ValidatorRule>,
    pub post_functions: Vec<PostFunctionRule>,
    pub screen: Option<Screen>,
    pub screen_fields: Vec<ScreenField>,
}

impl TransitionPipeline {
    pub fn required_fields(&self) -> impl Iterator<Item = &ScreenField> {
        self.screen_fields.iter().filter(|f| f.is_required)
    }
}

/// Exact issue-type mapping first, then the scheme default.
pub fn select_mapping<'a>(
    mappings: &'a [SchemeMapping],
    issue_type_id: &IssueTypeId,
) -> Option<&'a SchemeMapping> {
    mappings
        .iter()
        .find(|m| m.issue_type_id.as_ref() == Some(issue_type_id))
        .or_else(|| mappings.iter().find(|m| m.is_default()))
}

#[derive(Clone)]
pub struct WorkflowCatalog {
    storage: Arc<dyn TrackerStorage>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryTrackerStorage::new()))
    }

    pub fn with_storage(storage: Arc<dyn TrackerStorage>) -> Self {
        Self { storage }
    }

    /// Never falls back to a built-in workflow: an unmapped issue type is a
    /// configuration error.
    pub async fn get_workflow_for_issue_type(
        &self,
        scheme_id: &WorkflowSchemeId,
        issue_type_id: &IssueTypeId,
    ) -> WorkflowResult<Workflow> {
        let mappings = self.storage.list_scheme_mappings(scheme_id).await?;
        let mapping = select_mapping(&mappings, issue_type_id).ok_or_else(|| {
            TransitionError::NotFound(format!(
                "workflow for issue type {} in scheme {}",
                issue_type_id, scheme_id
            ))
        })?;
        self.workflow(&mapping.workflow_id).await
    }

    /// Follow the project's workflow scheme to the issue type's workflow.
    pub async fn workflow_for_project(
        &self,
        project_id: &ProjectId,
        issue_type_id: &IssueTypeId,
    ) -> WorkflowResult<Workflow> {
        let project = self
            .storage
            .get_project(project_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("project {}", project_id)))?;
        let scheme_id = project.workflow_scheme_id.ok_or_else(|| {
            TransitionError::NotFound(format!("workflow scheme for project {}", project_id))
        })?;
        self.get_workflow_for_issue_type(&scheme_id, issue_type_id)
            .await
    }

    pub async fn workflow(&self, workflow_id: &WorkflowId) -> WorkflowResult<Workflow> {
        self.storage
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("workflow {}", workflow_id)))
    }

    /// Edge existence only; the pipeline is not evaluated.
    pub async fn is_valid_transition(
        &self,
        workflow_id: &WorkflowId,
        from_status: &StatusId,
        to_status: &StatusId,
    ) -> WorkflowResult<bool> {
        Ok(self
            .storage
            .find_transition(workflow_id, from_status, to_status)
            .await?
            .is_some())
    }

    pub async fn find_transition(
        &self,
        workflow_id: &WorkflowId,
        from_status: &StatusId,
        to_status: &StatusId,
    ) -> WorkflowResult<Option<Transition>> {
        Ok(self
            .storage
            .find_transition(workflow_id, from_status, to_status)
            .await?)
    }

    pub async fn list_statuses(&self, workflow_id: &WorkflowId) -> WorkflowResult<Vec<Status>> {
        Ok(self.storage.list_statuses(workflow_id).await?)
    }

    /// The status with the lowest position.
    pub async fn initial_status(&self, workflow_id: &WorkflowId) -> WorkflowResult<Status> {
        self.storage
            .list_statuses(workflow_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TransitionError::NotFound(format!("initial status of workflow {}", workflow_id))
            })
    }

    pub async fn is_terminal(&self, status_id: &StatusId) -> WorkflowResult<bool> {
        self.storage
            .get_status(status_id)
            .await?
            .map(|status| status.is_terminal())
            .ok_or_else(|| TransitionError::NotFound(format!("status {}", status_id)))
    }

    /// Outgoing edges of one status, by name.
    pub async fn transitions_from(
        &self,
        workflow_id: &WorkflowId,
        from_status: &StatusId,
    ) -> WorkflowResult<Vec<Transition>> {
        Ok(self
            .storage
            .list_transitions(workflow_id)
            .await?
            .into_iter()
            .filter(|t| &t.from_status == from_status)
            .collect())
    }

    pub async fn load_pipeline(
        &self,
        transition_id: &TransitionId,
    ) -> WorkflowResult<TransitionPipeline> {
        let transition = self
            .storage
            .get_transition(transition_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("transition {}", transition_id)))?;
        self.pipeline_for(transition).await
    }

    pub(crate) async fn pipeline_for(
        &self,
        transition: Transition,
    ) -> WorkflowResult<TransitionPipeline> {
        let conditions = self.storage.list_conditions(&transition.id).await?;
        let validators = self.storage.list_validators(&transition.id).await?;
        let post_functions = self.storage.list_post_functions(&transition.id).await?;
        let (screen, screen_fields) = match &transition.screen_id {
            Some(screen_id) => {
                let screen = self.storage.get_screen(screen_id).await?.ok_or_else(|| {
                    TransitionError::NotFound(format!("screen {}", screen_id))
                })?;
                (Some(screen), self.storage.list_screen_fields(screen_id).await?)
            }
            None => (None, Vec::new()),
        };
        Ok(TransitionPipeline {
            transition,
            conditions,
            validators,
            post_functions,
            screen,
            screen_fields,
        })
    }

    /// Point an issue type (or, with `None`, the scheme default) at a
    /// workflow. Replaces any previous mapping for the same key.
    pub async fn map_issue_type(
        &self,
        scheme_id: &WorkflowSchemeId,
        issue_type_id: Option<IssueTypeId>,
        workflow_id: &WorkflowId,
    ) -> WorkflowResult<()> {
        if self.storage.get_workflow_scheme(scheme_id).await?.is_none() {
            return Err(TransitionError::NotFound(format!(
                "workflow scheme {}",
                scheme_id
            )));
        }
        self.workflow(workflow_id).await?;
        self.storage
            .upsert_scheme_mapping(SchemeMapping {
                scheme_id: scheme_id.clone(),
                issue_type_id: issue_type_id.clone(),
                workflow_id: workflow_id.clone(),
            })
            .await?;
        tracing::info!(
            scheme_id = %scheme_id,
            issue_type_id = issue_type_id.as_ref().map(|id| id.as_str()).unwrap_or("default"),
            workflow_id = %workflow_id,
            "workflow scheme mapping set"
        );
        Ok(())
    }

    pub async fn unmap_issue_type(
        &self,
        scheme_id: &WorkflowSchemeId,
        issue_type_id: Option<&IssueTypeId>,
    ) -> WorkflowResult<()> {
        if !self
            .storage
            .remove_scheme_mapping(scheme_id, issue_type_id)
            .await?
        {
            return Err(TransitionError::NotFound(format!(
                "mapping in workflow scheme {}",
                scheme_id
            )));
        }
        Ok(())
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::new()
    }
}
