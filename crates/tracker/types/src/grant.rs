//! Permission schemes and the grants they carry.

use crate::{
    GlobalGrantId, GlobalPermission, GlobalRoleId, GrantId, GroupId, ParseError, Permission,
    PermissionSchemeId, RoleId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of subject a scheme grant applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GranteeType {
    User,
    Group,
    ProjectRole,
    Anyone,
}

impl GranteeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GranteeType::User => "user",
            GranteeType::Group => "group",
            GranteeType::ProjectRole => "project_role",
            GranteeType::Anyone => "anyone",
        }
    }
}

impl FromStr for GranteeType {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(GranteeType::User),
            "group" => Ok(GranteeType::Group),
            "project_role" => Ok(GranteeType::ProjectRole),
            "anyone" => Ok(GranteeType::Anyone),
            other => Err(ParseError::UnknownGranteeType(other.to_string())),
        }
    }
}

/// Subject of a scheme grant. `Anyone` carries no id: it matches every
/// authenticated user of a project that uses the scheme.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "grantee_type", content = "grantee_id", rename_all = "snake_case")]
pub enum Grantee {
    User(UserId),
    Group(GroupId),
    ProjectRole(RoleId),
    Anyone,
}

impl Grantee {
    pub fn kind(&self) -> GranteeType {
        match self {
            Grantee::User(_) => GranteeType::User,
            Grantee::Group(_) => GranteeType::Group,
            Grantee::ProjectRole(_) => GranteeType::ProjectRole,
            Grantee::Anyone => GranteeType::Anyone,
        }
    }

    /// The raw grantee id, absent for `Anyone`.
    pub fn id(&self) -> Option<&str> {
        match self {
            Grantee::User(id) => Some(id.as_str()),
            Grantee::Group(id) => Some(id.as_str()),
            Grantee::ProjectRole(id) => Some(id.as_str()),
            Grantee::Anyone => None,
        }
    }

    /// Rebuild a grantee from its relational `(type, id?)` encoding.
    pub fn from_parts(kind: GranteeType, id: Option<&str>) -> Result<Self, ParseError> {
        match (kind, id) {
            (GranteeType::User, Some(id)) => Ok(Grantee::User(UserId::new(id))),
            (GranteeType::Group, Some(id)) => Ok(Grantee::Group(GroupId::new(id))),
            (GranteeType::ProjectRole, Some(id)) => Ok(Grantee::ProjectRole(RoleId::new(id))),
            (GranteeType::Anyone, None) => Ok(Grantee::Anyone),
            (GranteeType::Anyone, Some(_)) => Err(ParseError::InvalidGrantee(
                "anyone grant must not carry a grantee id".to_string(),
            )),
            (kind, None) => Err(ParseError::InvalidGrantee(format!(
                "{} grant requires a grantee id",
                kind.as_str()
            ))),
        }
    }
}

/// Named bundle of grants. A project references exactly one scheme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionScheme {
    pub id: PermissionSchemeId,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl PermissionScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PermissionSchemeId::generate(),
            name: name.into(),
            description: None,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// One `(scheme, permission, grantee)` fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeGrant {
    pub id: GrantId,
    pub scheme_id: PermissionSchemeId,
    pub permission: Permission,
    pub grantee: Grantee,
    pub created_at: DateTime<Utc>,
}

impl SchemeGrant {
    /// Natural key used for idempotent upserts.
    pub fn key(&self) -> (&PermissionSchemeId, Permission, &Grantee) {
        (&self.scheme_id, self.permission, &self.grantee)
    }
}

/// Global permission grant. With neither a role nor a group it is open to
/// every authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPermissionGrant {
    pub id: GlobalGrantId,
    pub permission: GlobalPermission,
    pub global_role_id: Option<GlobalRoleId>,
    pub group_id: Option<GroupId>,
    pub created_at: DateTime<Utc>,
}

impl GlobalPermissionGrant {
    pub fn is_open(&self) -> bool {
        self.global_role_id.is_none() && self.group_id.is_none()
    }
}
