//! Users, groups and projects as seen by the authorization core.

use crate::{GroupId, PermissionSchemeId, ProjectId, UserId, WorkflowSchemeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    /// Legacy super-user flag. Honoured for project checks while `is_active`.
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: UserId::generate(),
            display_name: username.clone(),
            username,
            is_admin: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_legacy_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_legacy_admin(&self) -> bool {
        self.is_admin && self.is_active
    }
}

/// Flat user group. Groups never contain other groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupId::generate(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }
}

/// The slice of a project row the core reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub key: String,
    pub name: String,
    pub lead_id: Option<UserId>,
    pub permission_scheme_id: PermissionSchemeId,
    pub workflow_scheme_id: Option<WorkflowSchemeId>,
    pub created_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        permission_scheme_id: PermissionSchemeId,
    ) -> Self {
        Self {
            id: ProjectId::generate(),
            key: key.into(),
            name: name.into(),
            lead_id: None,
            permission_scheme_id,
            workflow_scheme_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_lead(mut self, lead_id: UserId) -> Self {
        self.lead_id = Some(lead_id);
        self
    }

    pub fn with_workflow_scheme(mut self, scheme_id: WorkflowSchemeId) -> Self {
        self.workflow_scheme_id = Some(scheme_id);
        self
    }
}
