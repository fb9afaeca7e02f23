//! Transition Executor.
//!
//! One call moves one issue along one edge:
//!
//! 1. resolve the workflow through the project's workflow scheme,
//! 2. find the edge from the issue's status to the target,
//! 3. run conditions, then validators, then the screen's required fields,
//!    each in ascending position and stopping at the first failure,
//! 4. commit status, submitted fields, resolution and comment with a
//!    compare-and-swap on the status that was read,
//! 5. run post-functions in a spawned task, each under a timeout.
//!
//! Nothing after step 4 can undo the commit. Post-function failures come
//! back as warnings on an `Ok` result.

use crate::catalog::{TransitionPipeline, WorkflowCatalog};
use crate::notify::NotificationDispatcher;
use crate::pipeline::{PipelineContext, PipelineRegistry, PipelineServices, TransitionInput, Verdict};
use crate::{PostFunctionWarning, TransitionError, TransitionRejection, WorkflowResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracker_storage::{IssueStore, StorageError, TrackerStorage, TransitionCommit, WorkflowStore};
use tracker_types::{
    value_is_empty, ConditionRule, FieldRef, IssueRecord, PostFunctionRule, ScreenField,
    StandardField, StatusId, Transition, UserId, ValidatorRule,
};

pub const DEFAULT_POST_FUNCTION_TIMEOUT: Duration = Duration::from_millis(5000);

/// A committed transition. `warnings` lists post-functions that failed
/// afterwards; the status change stands regardless.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub issue: IssueRecord,
    pub transition: Transition,
    pub from_status: StatusId,
    pub to_status: StatusId,
    pub warnings: Vec<PostFunctionWarning>,
}

impl TransitionResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Clone)]
pub struct TransitionExecutor {
    catalog: WorkflowCatalog,
    registry: Arc<PipelineRegistry>,
    services: PipelineServices,
    post_function_timeout: Duration,
}

impl TransitionExecutor {
    pub fn new(
        storage: Arc<dyn TrackerStorage>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            catalog: WorkflowCatalog::with_storage(Arc::clone(&storage)),
            registry: Arc::new(PipelineRegistry::with_builtins()),
            services: PipelineServices::new(storage, dispatcher),
            post_function_timeout: DEFAULT_POST_FUNCTION_TIMEOUT,
        }
    }

    pub fn with_registry(mut self, registry: PipelineRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_post_function_timeout(mut self, timeout: Duration) -> Self {
        self.post_function_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    pub async fn attempt_transition(
        &self,
        issue: &IssueRecord,
        to_status: &StatusId,
        actor: &UserId,
        input: TransitionInput,
    ) -> WorkflowResult<TransitionResult> {
        let workflow = self
            .catalog
            .workflow_for_project(&issue.project_id, &issue.issue_type_id)
            .await?;
        let from_status = issue.status_id.clone();
        let Some(transition) = self
            .catalog
            .find_transition(&workflow.id, &from_status, to_status)
            .await?
        else {
            tracing::debug!(
                issue_id = %issue.id,
                from_status = %from_status,
                to_status = %to_status,
                "no such transition"
            );
            return Err(no_such_transition(&from_status, to_status));
        };
        let pipeline = self.catalog.pipeline_for(transition).await?;
        let ctx = PipelineContext {
            issue: issue.clone(),
            actor: actor.clone(),
            transition: pipeline.transition.clone(),
            input,
            services: self.services.clone(),
        };

        if let Some(rule) = self.first_failed_condition(&ctx, &pipeline.conditions).await? {
            let condition_type = rule.kind.condition_type();
            tracing::debug!(
                issue_id = %issue.id,
                condition = condition_type.as_str(),
                position = rule.position,
                "transition condition not met"
            );
            return Err(TransitionError::rejected(
                TransitionRejection::ConditionNotMet {
                    condition_type,
                    position: rule.position,
                },
            ));
        }
        self.run_validators(&ctx, &pipeline.validators).await?;
        check_screen(&ctx, &pipeline)?;

        let committed = self.commit(&ctx, to_status).await?;
        tracing::info!(
            issue_id = %committed.id,
            issue_key = %committed.key,
            transition = %pipeline.transition.name,
            from_status = %from_status,
            to_status = %to_status,
            actor = %actor,
            "issue transitioned"
        );

        let ctx = PipelineContext {
            issue: committed,
            ..ctx
        };
        let (issue, warnings) = self.run_post_functions(ctx, pipeline.post_functions).await;
        Ok(TransitionResult {
            issue,
            transition: pipeline.transition,
            from_status,
            to_status: to_status.clone(),
            warnings,
        })
    }

    /// Outgoing transitions whose conditions all pass for `actor`.
    /// Validators are not consulted: they judge submitted input.
    pub async fn available_transitions(
        &self,
        issue: &IssueRecord,
        actor: &UserId,
    ) -> WorkflowResult<Vec<Transition>> {
        let workflow = self
            .catalog
            .workflow_for_project(&issue.project_id, &issue.issue_type_id)
            .await?;
        let mut available = Vec::new();
        for transition in self
            .catalog
            .transitions_from(&workflow.id, &issue.status_id)
            .await?
        {
            let conditions = self.services.storage.list_conditions(&transition.id).await?;
            let ctx = PipelineContext {
                issue: issue.clone(),
                actor: actor.clone(),
                transition,
                input: TransitionInput::new(),
                services: self.services.clone(),
            };
            if self.first_failed_condition(&ctx, &conditions).await?.is_none() {
                available.push(ctx.transition);
            }
        }
        Ok(available)
    }

    async fn first_failed_condition<'a>(
        &self,
        ctx: &PipelineContext,
        rules: &'a [ConditionRule],
    ) -> WorkflowResult<Option<&'a ConditionRule>> {
        for rule in rules {
            let check = self.registry.condition(rule.kind.condition_type())?;
            if !check.check(ctx, &rule.kind).await? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    async fn run_validators(
        &self,
        ctx: &PipelineContext,
        rules: &[ValidatorRule],
    ) -> WorkflowResult<()> {
        for rule in rules {
            let validator_type = rule.kind.validator_type();
            let check = self.registry.validator(validator_type)?;
            if let Verdict::Fail(reason) = check.validate(ctx, &rule.kind).await? {
                tracing::debug!(
                    issue_id = %ctx.issue.id,
                    validator = validator_type.as_str(),
                    position = rule.position,
                    "transition validation failed"
                );
                return Err(TransitionError::rejected(
                    TransitionRejection::ValidationFailed {
                        validator: validator_type.as_str().to_string(),
                        message: rule.error_message.clone().unwrap_or(reason),
                    },
                ));
            }
        }
        Ok(())
    }

    async fn commit(&self, ctx: &PipelineContext, to_status: &StatusId) -> WorkflowResult<IssueRecord> {
        let commit = TransitionCommit {
            issue_id: ctx.issue.id.clone(),
            expected_status: ctx.issue.status_id.clone(),
            new_status: to_status.clone(),
            actor: ctx.actor.clone(),
            field_updates: ctx.input.field_updates(),
            resolution: ctx.input.resolution_text().map(str::to_string),
            comment: ctx.input.comment_text().map(str::to_string),
            committed_at: Utc::now(),
        };
        match self.services.storage.commit_transition(commit).await {
            Ok(issue) => Ok(issue),
            Err(StorageError::StatusMismatch { actual, .. }) => {
                tracing::warn!(
                    issue_id = %ctx.issue.id,
                    expected_status = %ctx.issue.status_id,
                    actual_status = %actual,
                    "issue status changed before commit"
                );
                Err(no_such_transition(&ctx.issue.status_id, to_status))
            }
            Err(StorageError::InvalidInput(message)) => Err(TransitionError::rejected(
                TransitionRejection::ValidationFailed {
                    validator: "field_value".to_string(),
                    message,
                },
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Runs detached from the caller: dropping the caller's future does not
    /// stop the remaining post-functions.
    async fn run_post_functions(
        &self,
        ctx: PipelineContext,
        rules: Vec<PostFunctionRule>,
    ) -> (IssueRecord, Vec<PostFunctionWarning>) {
        if rules.is_empty() {
            return (ctx.issue, Vec::new());
        }
        let committed = ctx.issue.clone();
        let pending = rules
            .iter()
            .map(|rule| (rule.kind.post_function_type(), rule.position))
            .collect::<Vec<_>>();
        let registry = Arc::clone(&self.registry);
        let timeout = self.post_function_timeout;

        let handle = tokio::spawn(async move {
            let mut ctx = ctx;
            let mut warnings = Vec::new();
            for rule in &rules {
                let post_function_type = rule.kind.post_function_type();
                let outcome = match registry.post_function(post_function_type) {
                    Ok(action) => {
                        match tokio::time::timeout(timeout, action.apply(&mut ctx, &rule.kind)).await
                        {
                            Ok(result) => result.map_err(|e| e.to_string()),
                            Err(_) => Err(format!("timed out after {} ms", timeout.as_millis())),
                        }
                    }
                    Err(e) => Err(e.to_string()),
                };
                if let Err(message) = outcome {
                    tracing::warn!(
                        issue_id = %ctx.issue.id,
                        post_function = post_function_type.as_str(),
                        position = rule.position,
                        error = %message,
                        "post-function failed"
                    );
                    warnings.push(PostFunctionWarning {
                        post_function_type,
                        position: rule.position,
                        message,
                    });
                }
            }
            (ctx.issue, warnings)
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(issue_id = %committed.id, error = %err, "post-function task aborted");
                let warnings = pending
                    .into_iter()
                    .map(|(post_function_type, position)| PostFunctionWarning {
                        post_function_type,
                        position,
                        message: "post-function pipeline aborted".to_string(),
                    })
                    .collect();
                (committed, warnings)
            }
        }
    }
}

fn no_such_transition(from_status: &StatusId, to_status: &StatusId) -> TransitionError {
    TransitionError::rejected(TransitionRejection::NoSuchTransition {
        from_status: from_status.clone(),
        to_status: to_status.clone(),
    })
}

fn check_screen(ctx: &PipelineContext, pipeline: &TransitionPipeline) -> WorkflowResult<()> {
    match pipeline.required_fields().find(|f| !screen_field_supplied(ctx, f)) {
        Some(missing) => Err(TransitionError::rejected(
            TransitionRejection::ValidationFailed {
                validator: "screen_required".to_string(),
                message: format!("{} is required", missing.field),
            },
        )),
        None => Ok(()),
    }
}

fn screen_field_supplied(ctx: &PipelineContext, screen_field: &ScreenField) -> bool {
    let resolution = FieldRef::standard(StandardField::Resolution);
    if screen_field.field == resolution && ctx.input.resolution_text().is_some() {
        return true;
    }
    !value_is_empty(&ctx.input.effective_value(&ctx.issue, &screen_field.field))
}
