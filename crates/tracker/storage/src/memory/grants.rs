use super::{remove_where, InMemoryTrackerStorage};
use crate::traits::GrantStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracker_types::{
    GlobalGrantId, GlobalPermission, GlobalPermissionGrant, GlobalRoleId, GrantId, Grantee,
    GroupId, Permission, PermissionScheme, PermissionSchemeId, SchemeGrant,
};

#[derive(Default)]
pub(super) struct GrantTables {
    schemes: HashMap<PermissionSchemeId, PermissionScheme>,
    grants: Vec<SchemeGrant>,
    global_grants: Vec<GlobalPermissionGrant>,
}

#[async_trait]
impl GrantStore for InMemoryTrackerStorage {
    async fn create_permission_scheme(&self, scheme: PermissionScheme) -> StorageResult<()> {
        let mut tables = self.write(&self.grants, "grants")?;
        if tables.schemes.contains_key(&scheme.id) {
            return Err(StorageError::Conflict(format!(
                "permission scheme {} already exists",
                scheme.id
            )));
        }
        if tables.schemes.values().any(|s| s.name == scheme.name) {
            return Err(StorageError::Conflict(format!(
                "permission scheme named {} already exists",
                scheme.name
            )));
        }
        if scheme.is_default && tables.schemes.values().any(|s| s.is_default) {
            return Err(StorageError::Conflict(
                "a default permission scheme already exists".to_string(),
            ));
        }
        tables.schemes.insert(scheme.id.clone(), scheme);
        Ok(())
    }

    async fn get_permission_scheme(
        &self,
        scheme_id: &PermissionSchemeId,
    ) -> StorageResult<Option<PermissionScheme>> {
        let tables = self.read(&self.grants, "grants")?;
        Ok(tables.schemes.get(scheme_id).cloned())
    }

    async fn list_permission_schemes(&self) -> StorageResult<Vec<PermissionScheme>> {
        let tables = self.read(&self.grants, "grants")?;
        let mut schemes = tables.schemes.values().cloned().collect::<Vec<_>>();
        schemes.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.name.cmp(&b.name)));
        Ok(schemes)
    }

    async fn default_permission_scheme(&self) -> StorageResult<Option<PermissionScheme>> {
        let tables = self.read(&self.grants, "grants")?;
        Ok(tables.schemes.values().find(|s| s.is_default).cloned())
    }

    async fn grant(
        &self,
        scheme_id: &PermissionSchemeId,
        permission: Permission,
        grantee: Grantee,
    ) -> StorageResult<SchemeGrant> {
        let mut tables = self.write(&self.grants, "grants")?;
        if !tables.schemes.contains_key(scheme_id) {
            return Err(StorageError::NotFound(format!(
                "permission scheme {} not found",
                scheme_id
            )));
        }
        if let Some(existing) = tables
            .grants
            .iter()
            .find(|g| g.key() == (scheme_id, permission, &grantee))
        {
            return Ok(existing.clone());
        }
        let grant = SchemeGrant {
            id: GrantId::generate(),
            scheme_id: scheme_id.clone(),
            permission,
            grantee,
            created_at: Utc::now(),
        };
        tables.grants.push(grant.clone());
        Ok(grant)
    }

    async fn revoke(
        &self,
        scheme_id: &PermissionSchemeId,
        permission: Permission,
        grantee: &Grantee,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.grants, "grants")?;
        Ok(remove_where(&mut tables.grants, |g| {
            g.key() == (scheme_id, permission, grantee)
        }))
    }

    async fn list_scheme_grants(
        &self,
        scheme_id: &PermissionSchemeId,
    ) -> StorageResult<Vec<SchemeGrant>> {
        let tables = self.read(&self.grants, "grants")?;
        let mut grants = tables
            .grants
            .iter()
            .filter(|g| &g.scheme_id == scheme_id)
            .cloned()
            .collect::<Vec<_>>();
        grants.sort_by(|a, b| {
            a.permission
                .as_str()
                .cmp(b.permission.as_str())
                .then_with(|| a.grantee.cmp(&b.grantee))
        });
        Ok(grants)
    }

    async fn list_grantees(
        &self,
        scheme_id: &PermissionSchemeId,
        permission: Permission,
    ) -> StorageResult<Vec<Grantee>> {
        let tables = self.read(&self.grants, "grants")?;
        Ok(tables
            .grants
            .iter()
            .filter(|g| &g.scheme_id == scheme_id && g.permission == permission)
            .map(|g| g.grantee.clone())
            .collect())
    }

    async fn grant_global_permission(
        &self,
        permission: GlobalPermission,
        global_role_id: Option<GlobalRoleId>,
        group_id: Option<GroupId>,
    ) -> StorageResult<GlobalPermissionGrant> {
        let mut tables = self.write(&self.grants, "grants")?;
        if let Some(existing) = tables.global_grants.iter().find(|g| {
            g.permission == permission && g.global_role_id == global_role_id && g.group_id == group_id
        }) {
            return Ok(existing.clone());
        }
        let grant = GlobalPermissionGrant {
            id: GlobalGrantId::generate(),
            permission,
            global_role_id,
            group_id,
            created_at: Utc::now(),
        };
        tables.global_grants.push(grant.clone());
        Ok(grant)
    }

    async fn revoke_global_permission(&self, grant_id: &GlobalGrantId) -> StorageResult<bool> {
        let mut tables = self.write(&self.grants, "grants")?;
        Ok(remove_where(&mut tables.global_grants, |g| &g.id == grant_id))
    }

    async fn list_global_grants(
        &self,
        permission: GlobalPermission,
    ) -> StorageResult<Vec<GlobalPermissionGrant>> {
        let tables = self.read(&self.grants, "grants")?;
        Ok(tables
            .global_grants
            .iter()
            .filter(|g| g.permission == permission)
            .cloned()
            .collect())
    }
}
