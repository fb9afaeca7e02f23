use super::InMemoryTrackerStorage;
use crate::traits::{DirectoryStore, ProjectStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracker_types::{
    Group, GroupId, PermissionSchemeId, ProjectId, ProjectRecord, UserAccount, UserId,
    WorkflowSchemeId,
};

#[derive(Default)]
pub(super) struct DirectoryTables {
    users: HashMap<UserId, UserAccount>,
    groups: HashMap<GroupId, Group>,
    memberships: BTreeSet<(GroupId, UserId)>,
}

#[async_trait]
impl DirectoryStore for InMemoryTrackerStorage {
    async fn upsert_user(&self, user: UserAccount) -> StorageResult<()> {
        let mut tables = self.write(&self.directory, "directory")?;
        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> StorageResult<Option<UserAccount>> {
        let tables = self.read(&self.directory, "directory")?;
        Ok(tables.users.get(user_id).cloned())
    }

    async fn create_group(&self, group: Group) -> StorageResult<()> {
        let mut tables = self.write(&self.directory, "directory")?;
        if tables.groups.values().any(|g| g.name == group.name) {
            return Err(StorageError::Conflict(format!(
                "group named {} already exists",
                group.name
            )));
        }
        if tables.groups.contains_key(&group.id) {
            return Err(StorageError::Conflict(format!(
                "group {} already exists",
                group.id
            )));
        }
        tables.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn get_group(&self, group_id: &GroupId) -> StorageResult<Option<Group>> {
        let tables = self.read(&self.directory, "directory")?;
        Ok(tables.groups.get(group_id).cloned())
    }

    async fn add_group_member(&self, group_id: &GroupId, user_id: &UserId) -> StorageResult<bool> {
        let mut tables = self.write(&self.directory, "directory")?;
        if !tables.groups.contains_key(group_id) {
            return Err(StorageError::NotFound(format!("group {} not found", group_id)));
        }
        Ok(tables
            .memberships
            .insert((group_id.clone(), user_id.clone())))
    }

    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.directory, "directory")?;
        Ok(tables
            .memberships
            .remove(&(group_id.clone(), user_id.clone())))
    }

    async fn list_group_members(&self, group_id: &GroupId) -> StorageResult<Vec<UserId>> {
        let tables = self.read(&self.directory, "directory")?;
        Ok(tables
            .memberships
            .iter()
            .filter(|(group, _)| group == group_id)
            .map(|(_, user)| user.clone())
            .collect())
    }

    async fn list_groups_for_user(&self, user_id: &UserId) -> StorageResult<BTreeSet<GroupId>> {
        let tables = self.read(&self.directory, "directory")?;
        Ok(tables
            .memberships
            .iter()
            .filter(|(_, user)| user == user_id)
            .map(|(group, _)| group.clone())
            .collect())
    }
}

#[async_trait]
impl ProjectStore for InMemoryTrackerStorage {
    async fn create_project(&self, project: ProjectRecord) -> StorageResult<()> {
        let mut projects = self.write(&self.projects, "projects")?;
        if projects.contains_key(&project.id) {
            return Err(StorageError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }
        if projects.values().any(|p| p.key == project.key) {
            return Err(StorageError::Conflict(format!(
                "project key {} already in use",
                project.key
            )));
        }
        projects.insert(project.id.clone(), project);
        Ok(())
    }

    async fn get_project(&self, project_id: &ProjectId) -> StorageResult<Option<ProjectRecord>> {
        let projects = self.read(&self.projects, "projects")?;
        Ok(projects.get(project_id).cloned())
    }

    async fn set_permission_scheme(
        &self,
        project_id: &ProjectId,
        scheme_id: &PermissionSchemeId,
    ) -> StorageResult<()> {
        let mut projects = self.write(&self.projects, "projects")?;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| StorageError::NotFound(format!("project {} not found", project_id)))?;
        project.permission_scheme_id = scheme_id.clone();
        Ok(())
    }

    async fn set_workflow_scheme(
        &self,
        project_id: &ProjectId,
        scheme_id: Option<&WorkflowSchemeId>,
    ) -> StorageResult<()> {
        let mut projects = self.write(&self.projects, "projects")?;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| StorageError::NotFound(format!("project {} not found", project_id)))?;
        project.workflow_scheme_id = scheme_id.cloned();
        Ok(())
    }
}
