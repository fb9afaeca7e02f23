//! Transition pipeline evaluators and their registry.
//!
//! Each rule's `type` tag selects an evaluator from the [`PipelineRegistry`];
//! the evaluator receives the rule's typed configuration. Conditions and
//! validators are predicates with no side effects. Post-functions act
//! through the storage and notification handles in [`PipelineServices`].

mod conditions;
mod post_functions;
mod validators;

pub use conditions::BuiltinConditions;
pub use post_functions::BuiltinPostFunctions;
pub use validators::BuiltinValidators;

use crate::notify::NotificationDispatcher;
use crate::{TransitionError, WorkflowResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracker_access::{PermissionResolver, RoleDirectory};
use tracker_storage::{FieldUpdate, TrackerStorage};
use tracker_types::{
    ConditionKind, ConditionType, FieldRef, IssueRecord, PostFunctionKind, PostFunctionType,
    Transition, UserId, ValidatorKind, ValidatorType,
};

/// Values the acting user submits with a transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionInput {
    pub fields: BTreeMap<FieldRef, Value>,
    pub comment: Option<String>,
    pub resolution: Option<String>,
}

impl TransitionInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldRef, value: Value) -> Self {
        self.fields.insert(field, value);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn submitted(&self, field: &FieldRef) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The submitted value if any, else what the issue holds now.
    pub fn effective_value(&self, issue: &IssueRecord, field: &FieldRef) -> Value {
        self.fields
            .get(field)
            .cloned()
            .unwrap_or_else(|| issue.field_value(field))
    }

    /// Blank comments and resolutions count as absent.
    pub fn comment_text(&self) -> Option<&str> {
        non_blank(self.comment.as_deref())
    }

    pub fn resolution_text(&self) -> Option<&str> {
        non_blank(self.resolution.as_deref())
    }

    pub(crate) fn field_updates(&self) -> Vec<FieldUpdate> {
        self.fields
            .iter()
            .map(|(field, value)| FieldUpdate::new(field.clone(), value.clone()))
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Handles evaluators may use. Cheap to clone.
#[derive(Clone)]
pub struct PipelineServices {
    pub storage: Arc<dyn TrackerStorage>,
    pub resolver: PermissionResolver,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}

impl PipelineServices {
    pub fn new(
        storage: Arc<dyn TrackerStorage>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            resolver: PermissionResolver::with_storage(Arc::clone(&storage)),
            storage,
            dispatcher,
        }
    }

    pub fn roles(&self) -> &RoleDirectory {
        self.resolver.roles()
    }
}

/// One transition attempt as the evaluators see it. Post-functions receive
/// the committed issue and refresh it as they write.
#[derive(Clone)]
pub struct PipelineContext {
    pub issue: IssueRecord,
    pub actor: UserId,
    pub transition: Transition,
    pub input: TransitionInput,
    pub services: PipelineServices,
}

/// Outcome of one validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail(reason.into())
    }

    pub fn check(passed: bool, reason: impl FnOnce() -> String) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail(reason())
        }
    }
}

#[async_trait]
pub trait ConditionCheck: Send + Sync {
    async fn check(&self, ctx: &PipelineContext, kind: &ConditionKind) -> WorkflowResult<bool>;
}

#[async_trait]
pub trait ValidatorCheck: Send + Sync {
    async fn validate(&self, ctx: &PipelineContext, kind: &ValidatorKind)
        -> WorkflowResult<Verdict>;
}

#[async_trait]
pub trait PostFunctionAction: Send + Sync {
    async fn apply(&self, ctx: &mut PipelineContext, kind: &PostFunctionKind) -> WorkflowResult<()>;
}

/// Type tag to evaluator. Immutable once handed to an executor.
#[derive(Clone, Default)]
pub struct PipelineRegistry {
    conditions: HashMap<ConditionType, Arc<dyn ConditionCheck>>,
    validators: HashMap<ValidatorType, Arc<dyn ValidatorCheck>>,
    post_functions: HashMap<PostFunctionType, Arc<dyn PostFunctionAction>>,
}

impl PipelineRegistry {
    /// An empty registry. Every rule fails as misconfigured until its type
    /// is registered.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let conditions: Arc<dyn ConditionCheck> = Arc::new(BuiltinConditions);
        for ty in ConditionType::ALL {
            registry.register_condition(ty, Arc::clone(&conditions));
        }
        let validators: Arc<dyn ValidatorCheck> = Arc::new(BuiltinValidators);
        for ty in ValidatorType::ALL {
            registry.register_validator(ty, Arc::clone(&validators));
        }
        let post_functions: Arc<dyn PostFunctionAction> = Arc::new(BuiltinPostFunctions);
        for ty in PostFunctionType::ALL {
            registry.register_post_function(ty, Arc::clone(&post_functions));
        }
        registry
    }

    /// Replace the evaluator for one type tag.
    pub fn register_condition(&mut self, ty: ConditionType, check: Arc<dyn ConditionCheck>) {
        self.conditions.insert(ty, check);
    }

    pub fn register_validator(&mut self, ty: ValidatorType, check: Arc<dyn ValidatorCheck>) {
        self.validators.insert(ty, check);
    }

    pub fn register_post_function(
        &mut self,
        ty: PostFunctionType,
        action: Arc<dyn PostFunctionAction>,
    ) {
        self.post_functions.insert(ty, action);
    }

    pub fn condition(&self, ty: ConditionType) -> WorkflowResult<Arc<dyn ConditionCheck>> {
        self.conditions
            .get(&ty)
            .cloned()
            .ok_or_else(|| unregistered("condition", ty.as_str()))
    }

    pub fn validator(&self, ty: ValidatorType) -> WorkflowResult<Arc<dyn ValidatorCheck>> {
        self.validators
            .get(&ty)
            .cloned()
            .ok_or_else(|| unregistered("validator", ty.as_str()))
    }

    pub fn post_function(
        &self,
        ty: PostFunctionType,
    ) -> WorkflowResult<Arc<dyn PostFunctionAction>> {
        self.post_functions
            .get(&ty)
            .cloned()
            .ok_or_else(|| unregistered("post-function", ty.as_str()))
    }
}

fn unregistered(family: &str, tag: &str) -> TransitionError {
    TransitionError::Misconfigured(format!("no {family} registered for type {tag}"))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixture for evaluator tests.

    use super::*;
    use crate::notify::{Notification, OutboxDispatcher};
    use tokio::sync::mpsc;
    use tracker_storage::{InMemoryTrackerStorage, IssueStore, ProjectStore};
    use tracker_types::{
        IssueTypeId, PermissionSchemeId, ProjectRecord, StatusId, TransitionId, WorkflowId,
    };

    pub struct Harness {
        pub storage: Arc<InMemoryTrackerStorage>,
        pub outbox: mpsc::Receiver<Notification>,
        pub ctx: PipelineContext,
    }

    /// A project led by `lead`, and one issue reported by `reporter` that
    /// `actor` is transitioning from `open` to `closed`.
    pub async fn harness() -> Harness {
        let storage = Arc::new(InMemoryTrackerStorage::new());
        let project = ProjectRecord::new("TRK", "Tracker", PermissionSchemeId::new("perms"))
            .with_lead(UserId::new("lead"));
        let project_id = project.id.clone();
        storage.create_project(project).await.unwrap();
        let issue = IssueRecord::new(
            "TRK-1",
            project_id,
            IssueTypeId::new("task"),
            StatusId::new("open"),
            UserId::new("reporter"),
            "Fix login",
        );
        storage
            .create_issue(issue.clone(), &UserId::new("reporter"))
            .await
            .unwrap();

        let (dispatcher, outbox) = OutboxDispatcher::new(8);
        let services = PipelineServices::new(storage.clone(), Arc::new(dispatcher));
        let transition = Transition {
            id: TransitionId::new("close"),
            workflow_id: WorkflowId::new("w"),
            from_status: StatusId::new("open"),
            to_status: StatusId::new("closed"),
            name: "Close".to_string(),
            screen_id: None,
        };
        Harness {
            storage,
            outbox,
            ctx: PipelineContext {
                issue,
                actor: UserId::new("actor"),
                transition,
                input: TransitionInput::new(),
                services,
            },
        }
    }

    /// Store a child of the harness issue in `status`.
    pub async fn add_subtask(h: &Harness, key: &str, status: &StatusId) -> IssueRecord {
        let child = IssueRecord::new(
            key,
            h.ctx.issue.project_id.clone(),
            IssueTypeId::new("sub-task"),
            status.clone(),
            UserId::new("reporter"),
            "Child",
        )
        .with_parent(h.ctx.issue.id.clone());
        h.storage
            .create_issue(child.clone(), &UserId::new("reporter"))
            .await
            .unwrap();
        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracker_types::StandardField;

    #[test]
    fn effective_value_prefers_submission() {
        let issue = IssueRecord::new(
            "TRK-1",
            tracker_types::ProjectId::new("p"),
            tracker_types::IssueTypeId::new("task"),
            tracker_types::StatusId::new("open"),
            UserId::new("r"),
            "Old summary",
        );
        let summary = FieldRef::standard(StandardField::Summary);
        let input = TransitionInput::new();
        assert_eq!(input.effective_value(&issue, &summary), json!("Old summary"));
        let input = input.with_field(summary.clone(), json!("New summary"));
        assert_eq!(input.effective_value(&issue, &summary), json!("New summary"));
    }

    #[test]
    fn blank_comment_counts_as_absent() {
        assert_eq!(TransitionInput::new().with_comment("   ").comment_text(), None);
        assert_eq!(
            TransitionInput::new().with_comment("done").comment_text(),
            Some("done")
        );
    }

    #[test]
    fn builtins_cover_every_tag() {
        let registry = PipelineRegistry::with_builtins();
        for ty in ConditionType::ALL {
            assert!(registry.condition(ty).is_ok());
        }
        for ty in ValidatorType::ALL {
            assert!(registry.validator(ty).is_ok());
        }
        for ty in PostFunctionType::ALL {
            assert!(registry.post_function(ty).is_ok());
        }
    }

    #[test]
    fn empty_registry_reports_misconfiguration() {
        let err = PipelineRegistry::new()
            .condition(ConditionType::OnlyReporter)
            .err()
            .unwrap();
        assert!(matches!(err, TransitionError::Misconfigured(_)));
    }
}
