use super::InMemoryTrackerStorage;
use crate::model::{FieldUpdate, TransitionCommit};
use crate::traits::IssueStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracker_types::{Comment, IssueId, IssueRecord, StatusChange, UserId};

#[derive(Default)]
pub(super) struct IssueTables {
    issues: HashMap<IssueId, IssueRecord>,
    history: Vec<StatusChange>,
    comments: Vec<Comment>,
}

fn apply_updates(issue: &mut IssueRecord, updates: Vec<FieldUpdate>) -> StorageResult<()> {
    for update in updates {
        issue
            .set_field(&update.field, update.value)
            .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
    }
    Ok(())
}

#[async_trait]
impl IssueStore for InMemoryTrackerStorage {
    async fn create_issue(&self, issue: IssueRecord, created_by: &UserId) -> StorageResult<()> {
        let mut tables = self.write(&self.issues, "issues")?;
        if tables.issues.contains_key(&issue.id) {
            return Err(StorageError::Conflict(format!(
                "issue {} already exists",
                issue.id
            )));
        }
        tables.history.push(StatusChange {
            issue_id: issue.id.clone(),
            from_status: None,
            to_status: issue.status_id.clone(),
            changed_by: created_by.clone(),
            changed_at: issue.created_at,
        });
        tables.issues.insert(issue.id.clone(), issue);
        Ok(())
    }

    async fn get_issue(&self, issue_id: &IssueId) -> StorageResult<Option<IssueRecord>> {
        let tables = self.read(&self.issues, "issues")?;
        Ok(tables.issues.get(issue_id).cloned())
    }

    async fn list_subtasks(&self, parent_id: &IssueId) -> StorageResult<Vec<IssueRecord>> {
        let tables = self.read(&self.issues, "issues")?;
        let mut subtasks = tables
            .issues
            .values()
            .filter(|i| i.parent_id.as_ref() == Some(parent_id))
            .cloned()
            .collect::<Vec<_>>();
        subtasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        Ok(subtasks)
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> StorageResult<IssueRecord> {
        let mut tables = self.write(&self.issues, "issues")?;
        let current = tables
            .issues
            .get(&commit.issue_id)
            .ok_or_else(|| StorageError::NotFound(format!("issue {} not found", commit.issue_id)))?;

        if current.status_id != commit.expected_status {
            return Err(StorageError::StatusMismatch {
                issue_id: commit.issue_id.clone(),
                expected: commit.expected_status.clone(),
                actual: current.status_id.clone(),
            });
        }

        // Stage on a copy so a bad field write leaves the row untouched.
        let mut next = current.clone();
        apply_updates(&mut next, commit.field_updates)?;
        if let Some(resolution) = commit.resolution {
            next.resolution = Some(resolution);
        }
        next.status_id = commit.new_status.clone();
        next.updated_at = commit.committed_at;

        tables.history.push(StatusChange {
            issue_id: commit.issue_id.clone(),
            from_status: Some(commit.expected_status),
            to_status: commit.new_status,
            changed_by: commit.actor.clone(),
            changed_at: commit.committed_at,
        });
        if let Some(body) = commit.comment {
            let mut comment = Comment::new(commit.issue_id.clone(), commit.actor, body);
            comment.created_at = commit.committed_at;
            tables.comments.push(comment);
        }
        tables.issues.insert(commit.issue_id, next.clone());
        Ok(next)
    }

    async fn update_fields(
        &self,
        issue_id: &IssueId,
        updates: Vec<FieldUpdate>,
    ) -> StorageResult<IssueRecord> {
        let mut tables = self.write(&self.issues, "issues")?;
        let issue = tables
            .issues
            .get_mut(issue_id)
            .ok_or_else(|| StorageError::NotFound(format!("issue {} not found", issue_id)))?;
        let mut next = issue.clone();
        apply_updates(&mut next, updates)?;
        next.updated_at = Utc::now();
        *issue = next.clone();
        Ok(next)
    }

    async fn add_comment(&self, comment: Comment) -> StorageResult<()> {
        let mut tables = self.write(&self.issues, "issues")?;
        if !tables.issues.contains_key(&comment.issue_id) {
            return Err(StorageError::NotFound(format!(
                "issue {} not found",
                comment.issue_id
            )));
        }
        tables.comments.push(comment);
        Ok(())
    }

    async fn list_comments(&self, issue_id: &IssueId) -> StorageResult<Vec<Comment>> {
        let tables = self.read(&self.issues, "issues")?;
        Ok(tables
            .comments
            .iter()
            .filter(|c| &c.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn status_history(&self, issue_id: &IssueId) -> StorageResult<Vec<StatusChange>> {
        let tables = self.read(&self.issues, "issues")?;
        Ok(tables
            .history
            .iter()
            .filter(|c| &c.issue_id == issue_id)
            .cloned()
            .collect())
    }
}
