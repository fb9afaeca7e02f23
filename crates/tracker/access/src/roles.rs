//! Role Directory: project roles, their actors, and global roles.

use crate::{AccessError, AccessResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracker_storage::{
    DirectoryStore, InMemoryTrackerStorage, ProjectStore, RoleStore, TrackerStorage,
};
use tracker_types::{
    Actor, DefaultRoleActor, GlobalRole, GlobalRoleKind, GroupId, ProjectId, ProjectRole,
    RoleId, UserId,
};

/// True when `actor` stands for `user_id`, directly or through one level of
/// group membership.
pub fn actor_matches(actor: &Actor, user_id: &UserId, groups: &BTreeSet<GroupId>) -> bool {
    match actor {
        Actor::User(id) => id == user_id,
        Actor::Group(id) => groups.contains(id),
    }
}

/// Resolves actor membership (user or group) to project and global roles.
#[derive(Clone)]
pub struct RoleDirectory {
    storage: Arc<dyn TrackerStorage>,
}

impl RoleDirectory {
    /// Create a directory backed by in-memory storage.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryTrackerStorage::new()))
    }

    pub fn with_storage(storage: Arc<dyn TrackerStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> Arc<dyn TrackerStorage> {
        Arc::clone(&self.storage)
    }

    pub async fn list_actors(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
    ) -> AccessResult<Vec<Actor>> {
        Ok(self.storage.list_role_actors(project_id, role_id).await?)
    }

    /// Direct user actor, or member of a group that is an actor, of `role_id`
    /// in `project_id`.
    pub async fn is_user_in_role(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        user_id: &UserId,
    ) -> AccessResult<bool> {
        let actors = self.storage.list_role_actors(project_id, role_id).await?;
        if actors
            .iter()
            .any(|actor| matches!(actor, Actor::User(id) if id == user_id))
        {
            return Ok(true);
        }
        if !actors.iter().any(|actor| matches!(actor, Actor::Group(_))) {
            return Ok(false);
        }
        let groups = self.storage.list_groups_for_user(user_id).await?;
        Ok(actors
            .iter()
            .any(|actor| actor_matches(actor, user_id, &groups)))
    }

    /// Roles the user holds in the project, ordered by name.
    pub async fn list_project_roles_for_user(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> AccessResult<Vec<ProjectRole>> {
        let groups = self.storage.list_groups_for_user(user_id).await?;
        let role_ids = self.role_ids_for_user(project_id, user_id, &groups).await?;
        let mut roles = Vec::with_capacity(role_ids.len());
        for role_id in &role_ids {
            if let Some(role) = self.storage.get_project_role(role_id).await? {
                roles.push(role);
            }
        }
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Ids of every role the user holds in the project, given the user's
    /// groups. Used by the resolver to avoid re-reading group membership.
    pub async fn role_ids_for_user(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        groups: &BTreeSet<GroupId>,
    ) -> AccessResult<BTreeSet<RoleId>> {
        let actors = self.storage.list_project_actors(project_id).await?;
        Ok(actors
            .into_iter()
            .filter(|row| actor_matches(&row.actor, user_id, groups))
            .map(|row| row.role_id)
            .collect())
    }

    /// Seed a new project's role membership from the default actors.
    /// Safe to call again: rows already present are left alone.
    pub async fn copy_default_actors_to_project(&self, project_id: &ProjectId) -> AccessResult<usize> {
        if self.storage.get_project(project_id).await?.is_none() {
            return Err(AccessError::NotFound(format!("project {}", project_id)));
        }
        let inserted = self
            .storage
            .copy_default_actors_to_project(project_id)
            .await?;
        tracing::info!(project_id = %project_id, inserted, "copied default role actors");
        Ok(inserted)
    }

    pub async fn add_actor(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        actor: Actor,
    ) -> AccessResult<bool> {
        self.require_role(role_id).await?;
        let added = self
            .storage
            .add_role_actor(project_id, role_id, actor.clone())
            .await?;
        if added {
            tracing::info!(
                project_id = %project_id,
                role_id = %role_id,
                actor_type = actor.actor_type().as_str(),
                actor_id = actor.actor_id(),
                "role actor added"
            );
        }
        Ok(added)
    }

    pub async fn remove_actor(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        actor: &Actor,
    ) -> AccessResult<()> {
        if !self
            .storage
            .remove_role_actor(project_id, role_id, actor)
            .await?
        {
            return Err(AccessError::NotFound(format!(
                "{} actor {} in role {}",
                actor.actor_type().as_str(),
                actor.actor_id(),
                role_id
            )));
        }
        tracing::info!(project_id = %project_id, role_id = %role_id, "role actor removed");
        Ok(())
    }

    pub async fn add_default_actor(&self, role_id: &RoleId, actor: Actor) -> AccessResult<bool> {
        self.require_role(role_id).await?;
        Ok(self.storage.add_default_actor(role_id, actor).await?)
    }

    pub async fn remove_default_actor(&self, role_id: &RoleId, actor: &Actor) -> AccessResult<()> {
        if !self.storage.remove_default_actor(role_id, actor).await? {
            return Err(AccessError::NotFound(format!(
                "default actor {} in role {}",
                actor.actor_id(),
                role_id
            )));
        }
        Ok(())
    }

    pub async fn list_default_actors(&self) -> AccessResult<Vec<DefaultRoleActor>> {
        Ok(self.storage.list_default_actors().await?)
    }

    /// Returns `false` if the user already held the role.
    pub async fn add_global_role_member(
        &self,
        kind: GlobalRoleKind,
        user_id: &UserId,
    ) -> AccessResult<bool> {
        let role = self.require_global_role(kind).await?;
        let added = self.storage.add_global_role_member(&role.id, user_id).await?;
        if added {
            tracing::info!(user_id = %user_id, global_role = kind.as_str(), "global role granted");
        }
        Ok(added)
    }

    pub async fn remove_global_role_member(
        &self,
        kind: GlobalRoleKind,
        user_id: &UserId,
    ) -> AccessResult<()> {
        let role = self.require_global_role(kind).await?;
        if !self.storage.remove_global_role_member(&role.id, user_id).await? {
            return Err(AccessError::NotFound(format!(
                "user {} in global role {}",
                user_id,
                kind.as_str()
            )));
        }
        tracing::info!(user_id = %user_id, global_role = kind.as_str(), "global role revoked");
        Ok(())
    }

    pub async fn global_roles_for_user(&self, user_id: &UserId) -> AccessResult<Vec<GlobalRole>> {
        Ok(self.storage.list_global_roles_for_user(user_id).await?)
    }

    pub async fn is_system_admin(&self, user_id: &UserId) -> AccessResult<bool> {
        let roles = self.storage.list_global_roles_for_user(user_id).await?;
        Ok(roles
            .iter()
            .any(|role| role.kind == GlobalRoleKind::SystemAdmin))
    }

    async fn require_global_role(&self, kind: GlobalRoleKind) -> AccessResult<GlobalRole> {
        self.storage
            .get_global_role(kind)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("global role {}", kind.as_str())))
    }

    async fn require_role(&self, role_id: &RoleId) -> AccessResult<()> {
        match self.storage.get_project_role(role_id).await? {
            Some(_) => Ok(()),
            None => Err(AccessError::NotFound(format!("project role {}", role_id))),
        }
    }
}

impl Default for RoleDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_types::{Group, PermissionSchemeId, ProjectRecord};

    struct Fixture {
        directory: RoleDirectory,
        storage: Arc<InMemoryTrackerStorage>,
        project: ProjectId,
        developers: RoleId,
        devs_group: GroupId,
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryTrackerStorage::new());
        let developers = ProjectRole::new("Developers");
        let developers_id = developers.id.clone();
        storage.create_project_role(developers).await.unwrap();
        let group = Group::new("devs");
        let group_id = group.id.clone();
        storage.create_group(group).await.unwrap();
        let project = ProjectRecord::new("P1", "Project one", PermissionSchemeId::new("perms"));
        let project_id = project.id.clone();
        storage.create_project(project).await.unwrap();
        Fixture {
            directory: RoleDirectory::with_storage(storage.clone()),
            storage,
            project: project_id,
            developers: developers_id,
            devs_group: group_id,
        }
    }

    #[tokio::test]
    async fn direct_actor_path() {
        let f = fixture().await;
        let alice = UserId::new("alice");
        assert!(!f
            .directory
            .is_user_in_role(&f.project, &f.developers, &alice)
            .await
            .unwrap());
        f.directory
            .add_actor(&f.project, &f.developers, Actor::User(alice.clone()))
            .await
            .unwrap();
        assert!(f
            .directory
            .is_user_in_role(&f.project, &f.developers, &alice)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn group_actor_path() {
        let f = fixture().await;
        let bob = UserId::new("bob");
        f.storage.add_group_member(&f.devs_group, &bob).await.unwrap();
        f.directory
            .add_actor(
                &f.project,
                &f.developers,
                Actor::Group(f.devs_group.clone()),
            )
            .await
            .unwrap();
        assert!(f
            .directory
            .is_user_in_role(&f.project, &f.developers, &bob)
            .await
            .unwrap());
        assert!(!f
            .directory
            .is_user_in_role(&f.project, &f.developers, &UserId::new("carol"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn membership_does_not_leak_across_projects() {
        let f = fixture().await;
        let alice = UserId::new("alice");
        f.directory
            .add_actor(&f.project, &f.developers, Actor::User(alice.clone()))
            .await
            .unwrap();
        assert!(!f
            .directory
            .is_user_in_role(&ProjectId::new("p2"), &f.developers, &alice)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn roles_for_user_are_sorted_and_deduplicated() {
        let f = fixture().await;
        let admins = ProjectRole::new("Administrators");
        let admins_id = admins.id.clone();
        f.storage.create_project_role(admins).await.unwrap();
        let alice = UserId::new("alice");
        f.storage.add_group_member(&f.devs_group, &alice).await.unwrap();

        // Holds Developers both directly and through the group.
        f.directory
            .add_actor(&f.project, &f.developers, Actor::User(alice.clone()))
            .await
            .unwrap();
        f.directory
            .add_actor(
                &f.project,
                &f.developers,
                Actor::Group(f.devs_group.clone()),
            )
            .await
            .unwrap();
        f.directory
            .add_actor(&f.project, &admins_id, Actor::User(alice.clone()))
            .await
            .unwrap();

        let names = f
            .directory
            .list_project_roles_for_user(&f.project, &alice)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Administrators", "Developers"]);
    }

    #[tokio::test]
    async fn unknown_role_is_not_found() {
        let f = fixture().await;
        let err = f
            .directory
            .add_actor(
                &f.project,
                &RoleId::new("ghost"),
                Actor::User(UserId::new("alice")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));

        let err = f
            .directory
            .remove_actor(&f.project, &f.developers, &Actor::User(UserId::new("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
    }

    #[tokio::test]
    async fn copy_defaults_twice_matches_once() {
        let f = fixture().await;
        f.directory
            .add_default_actor(&f.developers, Actor::Group(f.devs_group.clone()))
            .await
            .unwrap();
        assert_eq!(
            f.directory
                .copy_default_actors_to_project(&f.project)
                .await
                .unwrap(),
            1
        );
        let once = f.directory.list_actors(&f.project, &f.developers).await.unwrap();
        f.directory
            .copy_default_actors_to_project(&f.project)
            .await
            .unwrap();
        let twice = f.directory.list_actors(&f.project, &f.developers).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn copy_defaults_needs_an_existing_project() {
        let f = fixture().await;
        f.directory
            .add_default_actor(&f.developers, Actor::Group(f.devs_group.clone()))
            .await
            .unwrap();
        let ghost = ProjectId::new("ghost");
        let err = f
            .directory
            .copy_default_actors_to_project(&ghost)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
        assert!(f.storage.list_project_actors(&ghost).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn global_role_membership_round_trip() {
        let f = fixture().await;
        let root = UserId::new("root");
        let err = f
            .directory
            .add_global_role_member(GlobalRoleKind::SystemAdmin, &root)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));

        f.storage
            .create_global_role(GlobalRole::new(GlobalRoleKind::SystemAdmin))
            .await
            .unwrap();
        assert!(f
            .directory
            .add_global_role_member(GlobalRoleKind::SystemAdmin, &root)
            .await
            .unwrap());
        assert!(!f
            .directory
            .add_global_role_member(GlobalRoleKind::SystemAdmin, &root)
            .await
            .unwrap());
        assert!(f.directory.is_system_admin(&root).await.unwrap());

        f.directory
            .remove_global_role_member(GlobalRoleKind::SystemAdmin, &root)
            .await
            .unwrap();
        assert!(!f.directory.is_system_admin(&root).await.unwrap());
    }

    #[tokio::test]
    async fn default_actors_are_listed() {
        let f = fixture().await;
        f.directory
            .add_default_actor(&f.developers, Actor::Group(f.devs_group.clone()))
            .await
            .unwrap();
        let defaults = f.directory.list_default_actors().await.unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].role_id, f.developers);
    }
}
