//! Project roles, their actors, and fixed global roles.

use crate::{GlobalRoleId, GroupId, ParseError, ProjectId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role names seeded by a fresh installation.
pub const DEFAULT_PROJECT_ROLES: [&str; 3] = ["Administrators", "Developers", "Viewers"];

/// Administrator-configurable named actor set. Membership is per project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRole {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProjectRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RoleId::generate(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    Group,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::Group => "group",
        }
    }
}

/// A role member: a single user, or every member of a group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "actor_type", content = "actor_id", rename_all = "snake_case")]
pub enum Actor {
    User(UserId),
    Group(GroupId),
}

impl Actor {
    pub fn actor_type(&self) -> ActorType {
        match self {
            Actor::User(_) => ActorType::User,
            Actor::Group(_) => ActorType::Group,
        }
    }

    pub fn actor_id(&self) -> &str {
        match self {
            Actor::User(id) => id.as_str(),
            Actor::Group(id) => id.as_str(),
        }
    }
}

/// `(project, role, actor)` membership row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleActor {
    pub project_id: ProjectId,
    pub role_id: RoleId,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

/// Template membership copied into every new project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoleActor {
    pub role_id: RoleId,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

/// The fixed set of system-wide roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRoleKind {
    SystemAdmin,
    Admin,
    User,
}

impl GlobalRoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRoleKind::SystemAdmin => "system_admin",
            GlobalRoleKind::Admin => "admin",
            GlobalRoleKind::User => "user",
        }
    }

    pub fn all() -> [GlobalRoleKind; 3] {
        [
            GlobalRoleKind::SystemAdmin,
            GlobalRoleKind::Admin,
            GlobalRoleKind::User,
        ]
    }
}

impl FromStr for GlobalRoleKind {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system_admin" => Ok(GlobalRoleKind::SystemAdmin),
            "admin" => Ok(GlobalRoleKind::Admin),
            "user" => Ok(GlobalRoleKind::User),
            other => Err(ParseError::UnknownGlobalRole(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRole {
    pub id: GlobalRoleId,
    pub kind: GlobalRoleKind,
    pub name: String,
}

impl GlobalRole {
    pub fn new(kind: GlobalRoleKind) -> Self {
        let name = match kind {
            GlobalRoleKind::SystemAdmin => "System Administrators",
            GlobalRoleKind::Admin => "Administrators",
            GlobalRoleKind::User => "Users",
        };
        Self {
            id: GlobalRoleId::generate(),
            kind,
            name: name.to_string(),
        }
    }
}
