use super::{remove_where, InMemoryTrackerStorage};
use crate::traits::RoleStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tracker_types::{
    Actor, DefaultRoleActor, GlobalRole, GlobalRoleId, GlobalRoleKind, ProjectId, ProjectRole,
    RoleActor, RoleId, UserId,
};

#[derive(Default)]
pub(super) struct RoleTables {
    roles: HashMap<RoleId, ProjectRole>,
    actors: Vec<RoleActor>,
    defaults: Vec<DefaultRoleActor>,
    global_roles: HashMap<GlobalRoleId, GlobalRole>,
    global_members: BTreeSet<(GlobalRoleId, UserId)>,
}

impl RoleTables {
    fn require_role(&self, role_id: &RoleId) -> StorageResult<()> {
        if self.roles.contains_key(role_id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!(
                "project role {} not found",
                role_id
            )))
        }
    }

    fn has_actor(&self, project_id: &ProjectId, role_id: &RoleId, actor: &Actor) -> bool {
        self.actors
            .iter()
            .any(|a| &a.project_id == project_id && &a.role_id == role_id && &a.actor == actor)
    }
}

#[async_trait]
impl RoleStore for InMemoryTrackerStorage {
    async fn create_project_role(&self, role: ProjectRole) -> StorageResult<()> {
        let mut tables = self.write(&self.roles, "roles")?;
        if tables.roles.contains_key(&role.id) || tables.roles.values().any(|r| r.name == role.name)
        {
            return Err(StorageError::Conflict(format!(
                "project role {} already exists",
                role.name
            )));
        }
        tables.roles.insert(role.id.clone(), role);
        Ok(())
    }

    async fn get_project_role(&self, role_id: &RoleId) -> StorageResult<Option<ProjectRole>> {
        let tables = self.read(&self.roles, "roles")?;
        Ok(tables.roles.get(role_id).cloned())
    }

    async fn list_project_roles(&self) -> StorageResult<Vec<ProjectRole>> {
        let tables = self.read(&self.roles, "roles")?;
        let mut roles = tables.roles.values().cloned().collect::<Vec<_>>();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn add_role_actor(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        actor: Actor,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.roles, "roles")?;
        tables.require_role(role_id)?;
        if tables.has_actor(project_id, role_id, &actor) {
            return Ok(false);
        }
        tables.actors.push(RoleActor {
            project_id: project_id.clone(),
            role_id: role_id.clone(),
            actor,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove_role_actor(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        actor: &Actor,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.roles, "roles")?;
        Ok(remove_where(&mut tables.actors, |a| {
            &a.project_id == project_id && &a.role_id == role_id && &a.actor == actor
        }))
    }

    async fn list_role_actors(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
    ) -> StorageResult<Vec<Actor>> {
        let tables = self.read(&self.roles, "roles")?;
        let mut actors = tables
            .actors
            .iter()
            .filter(|a| &a.project_id == project_id && &a.role_id == role_id)
            .map(|a| a.actor.clone())
            .collect::<Vec<_>>();
        actors.sort();
        Ok(actors)
    }

    async fn list_project_actors(&self, project_id: &ProjectId) -> StorageResult<Vec<RoleActor>> {
        let tables = self.read(&self.roles, "roles")?;
        Ok(tables
            .actors
            .iter()
            .filter(|a| &a.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn add_default_actor(&self, role_id: &RoleId, actor: Actor) -> StorageResult<bool> {
        let mut tables = self.write(&self.roles, "roles")?;
        tables.require_role(role_id)?;
        if tables
            .defaults
            .iter()
            .any(|d| &d.role_id == role_id && d.actor == actor)
        {
            return Ok(false);
        }
        tables.defaults.push(DefaultRoleActor {
            role_id: role_id.clone(),
            actor,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove_default_actor(&self, role_id: &RoleId, actor: &Actor) -> StorageResult<bool> {
        let mut tables = self.write(&self.roles, "roles")?;
        Ok(remove_where(&mut tables.defaults, |d| {
            &d.role_id == role_id && &d.actor == actor
        }))
    }

    async fn list_default_actors(&self) -> StorageResult<Vec<DefaultRoleActor>> {
        let tables = self.read(&self.roles, "roles")?;
        Ok(tables.defaults.clone())
    }

    async fn copy_default_actors_to_project(&self, project_id: &ProjectId) -> StorageResult<usize> {
        let mut tables = self.write(&self.roles, "roles")?;
        let now = Utc::now();
        let missing = tables
            .defaults
            .iter()
            .filter(|d| !tables.has_actor(project_id, &d.role_id, &d.actor))
            .map(|d| RoleActor {
                project_id: project_id.clone(),
                role_id: d.role_id.clone(),
                actor: d.actor.clone(),
                created_at: now,
            })
            .collect::<Vec<_>>();
        let inserted = missing.len();
        tables.actors.extend(missing);
        Ok(inserted)
    }

    async fn create_global_role(&self, role: GlobalRole) -> StorageResult<()> {
        let mut tables = self.write(&self.roles, "roles")?;
        if tables.global_roles.values().any(|r| r.kind == role.kind) {
            return Err(StorageError::Conflict(format!(
                "global role {} already exists",
                role.kind.as_str()
            )));
        }
        tables.global_roles.insert(role.id.clone(), role);
        Ok(())
    }

    async fn get_global_role(&self, kind: GlobalRoleKind) -> StorageResult<Option<GlobalRole>> {
        let tables = self.read(&self.roles, "roles")?;
        Ok(tables.global_roles.values().find(|r| r.kind == kind).cloned())
    }

    async fn add_global_role_member(
        &self,
        role_id: &GlobalRoleId,
        user_id: &UserId,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.roles, "roles")?;
        if !tables.global_roles.contains_key(role_id) {
            return Err(StorageError::NotFound(format!(
                "global role {} not found",
                role_id
            )));
        }
        Ok(tables
            .global_members
            .insert((role_id.clone(), user_id.clone())))
    }

    async fn remove_global_role_member(
        &self,
        role_id: &GlobalRoleId,
        user_id: &UserId,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.roles, "roles")?;
        Ok(tables
            .global_members
            .remove(&(role_id.clone(), user_id.clone())))
    }

    async fn list_global_roles_for_user(&self, user_id: &UserId) -> StorageResult<Vec<GlobalRole>> {
        let tables = self.read(&self.roles, "roles")?;
        let mut roles = tables
            .global_members
            .iter()
            .filter(|(_, member)| member == user_id)
            .filter_map(|(role_id, _)| tables.global_roles.get(role_id).cloned())
            .collect::<Vec<_>>();
        roles.sort_by_key(|r| r.kind);
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_types::GroupId;

    async fn store_with_role(name: &str) -> (InMemoryTrackerStorage, RoleId) {
        let store = InMemoryTrackerStorage::new();
        let role = ProjectRole::new(name);
        let id = role.id.clone();
        store.create_project_role(role).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn actors_are_scoped_per_project() {
        let (store, role) = store_with_role("Developers").await;
        let p1 = ProjectId::new("p1");
        let p2 = ProjectId::new("p2");
        let alice = Actor::User(UserId::new("alice"));

        assert!(store.add_role_actor(&p1, &role, alice.clone()).await.unwrap());
        assert!(!store.add_role_actor(&p1, &role, alice.clone()).await.unwrap());
        assert_eq!(store.list_role_actors(&p1, &role).await.unwrap(), vec![alice]);
        assert!(store.list_role_actors(&p2, &role).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn copy_default_actors_is_a_set_union() {
        let (store, role) = store_with_role("Developers").await;
        let project = ProjectId::new("p1");
        let devs = Actor::Group(GroupId::new("devs"));
        let lead = Actor::User(UserId::new("lead"));
        store.add_default_actor(&role, devs.clone()).await.unwrap();
        store.add_default_actor(&role, lead.clone()).await.unwrap();
        store.add_role_actor(&project, &role, lead).await.unwrap();

        assert_eq!(store.copy_default_actors_to_project(&project).await.unwrap(), 1);
        let once = store.list_role_actors(&project, &role).await.unwrap();
        assert_eq!(store.copy_default_actors_to_project(&project).await.unwrap(), 0);
        let twice = store.list_role_actors(&project, &role).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[tokio::test]
    async fn default_actors_are_copies_not_references() {
        let (store, role) = store_with_role("Viewers").await;
        let project = ProjectId::new("p1");
        let viewer = Actor::User(UserId::new("viewer"));
        store.add_default_actor(&role, viewer.clone()).await.unwrap();
        store.copy_default_actors_to_project(&project).await.unwrap();
        store.remove_default_actor(&role, &viewer).await.unwrap();
        assert_eq!(
            store.list_role_actors(&project, &role).await.unwrap(),
            vec![viewer]
        );
    }

    #[tokio::test]
    async fn role_names_are_unique_and_sorted() {
        let (store, _) = store_with_role("Viewers").await;
        store
            .create_project_role(ProjectRole::new("Administrators"))
            .await
            .unwrap();
        let err = store
            .create_project_role(ProjectRole::new("Viewers"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        let names = store
            .list_project_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Administrators", "Viewers"]);
    }

    #[tokio::test]
    async fn global_role_membership() {
        let store = InMemoryTrackerStorage::new();
        let sysadmin = GlobalRole::new(GlobalRoleKind::SystemAdmin);
        let sysadmin_id = sysadmin.id.clone();
        store.create_global_role(sysadmin).await.unwrap();
        assert!(store
            .create_global_role(GlobalRole::new(GlobalRoleKind::SystemAdmin))
            .await
            .is_err());

        let root = UserId::new("root");
        store.add_global_role_member(&sysadmin_id, &root).await.unwrap();
        let roles = store.list_global_roles_for_user(&root).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].kind, GlobalRoleKind::SystemAdmin);

        store
            .remove_global_role_member(&sysadmin_id, &root)
            .await
            .unwrap();
        assert!(store.list_global_roles_for_user(&root).await.unwrap().is_empty());
    }
}
