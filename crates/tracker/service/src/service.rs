use crate::config::TrackerConfig;
use crate::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracker_access::PermissionResolver;
use tracker_storage::{InMemoryTrackerStorage, IssueStore, TrackerStorage};
use tracker_types::{IssueId, IssueRecord, Permission, StatusId, Transition, UserId};
use tracker_workflow::{
    Notification, OutboxDispatcher, TransitionExecutor, TransitionInput, TransitionResult,
};

/// Composition root: permission check first, then the transition pipeline.
#[derive(Clone)]
pub struct TrackerService {
    storage: Arc<dyn TrackerStorage>,
    resolver: PermissionResolver,
    executor: TransitionExecutor,
}

impl TrackerService {
    /// In-memory service. The receiver drains the notification outbox.
    pub fn new(config: &TrackerConfig) -> (Self, mpsc::Receiver<Notification>) {
        Self::with_storage(Arc::new(InMemoryTrackerStorage::new()), config)
    }

    pub fn with_storage(
        storage: Arc<dyn TrackerStorage>,
        config: &TrackerConfig,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (dispatcher, outbox) = OutboxDispatcher::new(config.notifications.outbox_capacity);
        let executor = TransitionExecutor::new(Arc::clone(&storage), Arc::new(dispatcher))
            .with_post_function_timeout(config.executor.post_function_timeout());
        let service = Self {
            resolver: PermissionResolver::with_storage(Arc::clone(&storage)),
            storage,
            executor,
        };
        (service, outbox)
    }

    pub fn storage(&self) -> Arc<dyn TrackerStorage> {
        Arc::clone(&self.storage)
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn executor(&self) -> &TransitionExecutor {
        &self.executor
    }

    /// Swap the executor, e.g. to install custom pipeline evaluators.
    pub fn with_executor(mut self, executor: TransitionExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub async fn transition_issue(
        &self,
        issue_id: &IssueId,
        to_status: &StatusId,
        actor: &UserId,
        input: TransitionInput,
    ) -> ServiceResult<TransitionResult> {
        let issue = self.load_issue(issue_id).await?;
        self.resolver
            .require_project_permission(actor, &issue.project_id, Permission::TransitionIssues)
            .await?;
        let result = self
            .executor
            .attempt_transition(&issue, to_status, actor, input)
            .await?;
        if result.has_warnings() {
            tracing::warn!(
                issue_key = %result.issue.key,
                warnings = result.warnings.len(),
                "transition committed with post-function warnings"
            );
        }
        Ok(result)
    }

    /// Transitions `actor` could take now. Empty without `transition_issues`.
    pub async fn available_transitions(
        &self,
        issue_id: &IssueId,
        actor: &UserId,
    ) -> ServiceResult<Vec<Transition>> {
        let issue = self.load_issue(issue_id).await?;
        if !self
            .resolver
            .has_project_permission(actor, &issue.project_id, Permission::TransitionIssues)
            .await?
        {
            return Ok(Vec::new());
        }
        Ok(self.executor.available_transitions(&issue, actor).await?)
    }

    async fn load_issue(&self, issue_id: &IssueId) -> ServiceResult<IssueRecord> {
        self.storage
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("issue {}", issue_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_issue_is_not_found() {
        let (service, _outbox) = TrackerService::new(&TrackerConfig::default());
        let result = tokio_test::block_on(service.transition_issue(
            &IssueId::new("TRK-404"),
            &StatusId::new("done"),
            &UserId::new("alice"),
            TransitionInput::new(),
        ));
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
