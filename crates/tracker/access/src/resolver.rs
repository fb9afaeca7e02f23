//! Permission Resolver.
//!
//! Answers "may this user do P here?" by folding six grant sources under a
//! fixed precedence (see [`crate::sources`]). Storage faults surface as
//! [`AccessError::Resolution`] and are never coerced into a denial.

use crate::sources::{
    resolve_global, resolve_project, AccessDecision, GlobalPrincipal, ProjectPrincipal,
};
use crate::{AccessError, AccessResult, RoleDirectory};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracker_storage::{DirectoryStore, GrantStore, InMemoryTrackerStorage, ProjectStore, TrackerStorage};
use tracker_types::{GlobalPermission, Permission, ProjectId, ProjectRecord, UserId};

#[derive(Clone)]
pub struct PermissionResolver {
    storage: Arc<dyn TrackerStorage>,
    roles: RoleDirectory,
}

impl PermissionResolver {
    /// Create a resolver backed by in-memory storage.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryTrackerStorage::new()))
    }

    pub fn with_storage(storage: Arc<dyn TrackerStorage>) -> Self {
        let roles = RoleDirectory::with_storage(Arc::clone(&storage));
        Self { storage, roles }
    }

    pub fn roles(&self) -> &RoleDirectory {
        &self.roles
    }

    /// Decision plus the source that granted it.
    pub async fn check_project_permission(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        permission: Permission,
    ) -> AccessResult<AccessDecision> {
        let project = self.project(project_id).await?;
        let principal = self.project_principal(user_id, project_id).await?;
        if principal.is_system_admin {
            return Ok(resolve_project(&principal, &[]));
        }
        let grantees = self
            .storage
            .list_grantees(&project.permission_scheme_id, permission)
            .await?;
        let decision = resolve_project(&principal, &grantees);
        tracing::debug!(
            user_id = %user_id,
            project_id = %project_id,
            permission = permission.as_str(),
            source = decision.source().map(|s| s.as_str()),
            "project permission resolved"
        );
        Ok(decision)
    }

    pub async fn has_project_permission(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        permission: Permission,
    ) -> AccessResult<bool> {
        Ok(self
            .check_project_permission(user_id, project_id, permission)
            .await?
            .is_granted())
    }

    /// `Ok(())` when granted, `PermissionDenied` when not.
    pub async fn require_project_permission(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        permission: Permission,
    ) -> AccessResult<()> {
        match self
            .check_project_permission(user_id, project_id, permission)
            .await
        {
            Ok(decision) if decision.is_granted() => Ok(()),
            Ok(_) => {
                tracing::debug!(user_id = %user_id, project_id = %project_id, permission = permission.as_str(), "permission denied");
                Err(AccessError::denied(permission))
            }
            Err(err) => {
                tracing::warn!(user_id = %user_id, project_id = %project_id, error = %err, "permission check failed");
                Err(err)
            }
        }
    }

    pub async fn check_global_permission(
        &self,
        user_id: &UserId,
        permission: GlobalPermission,
    ) -> AccessResult<AccessDecision> {
        let mut principal = GlobalPrincipal::new(user_id.clone());
        let global_roles = self.roles.global_roles_for_user(user_id).await?;
        principal.is_system_admin = global_roles
            .iter()
            .any(|r| r.kind == tracker_types::GlobalRoleKind::SystemAdmin);
        if principal.is_system_admin {
            return Ok(resolve_global(&principal, &[]));
        }
        principal.global_roles = global_roles.into_iter().map(|r| r.id).collect();
        principal.groups = self.storage.list_groups_for_user(user_id).await?;
        let grants = self.storage.list_global_grants(permission).await?;
        let decision = resolve_global(&principal, &grants);
        tracing::debug!(
            user_id = %user_id,
            permission = permission.as_str(),
            source = decision.source().map(|s| s.as_str()),
            "global permission resolved"
        );
        Ok(decision)
    }

    pub async fn has_global_permission(
        &self,
        user_id: &UserId,
        permission: GlobalPermission,
    ) -> AccessResult<bool> {
        Ok(self
            .check_global_permission(user_id, permission)
            .await?
            .is_granted())
    }

    pub async fn require_global_permission(
        &self,
        user_id: &UserId,
        permission: GlobalPermission,
    ) -> AccessResult<()> {
        if self.has_global_permission(user_id, permission).await? {
            Ok(())
        } else {
            Err(AccessError::denied(permission))
        }
    }

    /// Every project permission the user holds. Agrees with
    /// [`has_project_permission`](Self::has_project_permission) for each
    /// permission, admins included.
    pub async fn list_user_permissions(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> AccessResult<BTreeSet<Permission>> {
        let project = self.project(project_id).await?;
        let principal = self.project_principal(user_id, project_id).await?;
        if principal.is_system_admin || principal.is_legacy_admin {
            return Ok(Permission::all().iter().copied().collect());
        }
        let grants = self
            .storage
            .list_scheme_grants(&project.permission_scheme_id)
            .await?;
        let mut held = BTreeSet::new();
        for permission in Permission::all() {
            let grantees = grants
                .iter()
                .filter(|g| g.permission == *permission)
                .map(|g| g.grantee.clone())
                .collect::<Vec<_>>();
            if resolve_project(&principal, &grantees).is_granted() {
                held.insert(*permission);
            }
        }
        Ok(held)
    }

    async fn project(&self, project_id: &ProjectId) -> AccessResult<ProjectRecord> {
        self.storage
            .get_project(project_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("project {}", project_id)))
    }

    /// Gather the facts the grant sources need. Stops early for system
    /// admins since nothing else can change the answer.
    async fn project_principal(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> AccessResult<ProjectPrincipal> {
        let mut principal = ProjectPrincipal::new(user_id.clone());
        principal.is_system_admin = self.roles.is_system_admin(user_id).await?;
        if principal.is_system_admin {
            return Ok(principal);
        }
        principal.is_legacy_admin = self
            .storage
            .get_user(user_id)
            .await?
            .map(|user| user.is_legacy_admin())
            .unwrap_or(false);
        principal.groups = self.storage.list_groups_for_user(user_id).await?;
        principal.roles = self
            .roles
            .role_ids_for_user(project_id, user_id, &principal.groups)
            .await?;
        Ok(principal)
    }
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self::new()
    }
}
