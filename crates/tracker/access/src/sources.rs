//! Grant sources as independent pure predicates.
//!
//! The resolver gathers facts about the principal once, then walks these
//! sources in precedence order. Grants are additive, so the walk stops at
//! the first source that matches and never at a negative one.

use std::collections::BTreeSet;
use tracker_types::{GlobalPermissionGrant, GlobalRoleId, Grantee, GroupId, RoleId, UserId};

/// Where a positive answer came from, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GrantSource {
    SystemAdmin,
    LegacyAdmin,
    DirectUser,
    Group,
    ProjectRole,
    GlobalRole,
    Anyone,
}

impl GrantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantSource::SystemAdmin => "system_admin",
            GrantSource::LegacyAdmin => "legacy_admin",
            GrantSource::DirectUser => "direct_user",
            GrantSource::Group => "group",
            GrantSource::ProjectRole => "project_role",
            GrantSource::GlobalRole => "global_role",
            GrantSource::Anyone => "anyone",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Granted(GrantSource),
    Denied,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn source(&self) -> Option<GrantSource> {
        match self {
            AccessDecision::Granted(source) => Some(*source),
            AccessDecision::Denied => None,
        }
    }
}

/// What the resolver knows about one user in one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPrincipal {
    pub user_id: UserId,
    pub is_system_admin: bool,
    pub is_legacy_admin: bool,
    pub groups: BTreeSet<GroupId>,
    /// Roles the user holds in this project, directly or through a group.
    pub roles: BTreeSet<RoleId>,
}

impl ProjectPrincipal {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_system_admin: false,
            is_legacy_admin: false,
            groups: BTreeSet::new(),
            roles: BTreeSet::new(),
        }
    }
}

/// What the resolver knows about one user outside any project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalPrincipal {
    pub user_id: UserId,
    pub is_system_admin: bool,
    pub global_roles: BTreeSet<GlobalRoleId>,
    pub groups: BTreeSet<GroupId>,
}

impl GlobalPrincipal {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_system_admin: false,
            global_roles: BTreeSet::new(),
            groups: BTreeSet::new(),
        }
    }
}

type ProjectSource = fn(&ProjectPrincipal, &[Grantee]) -> bool;
type GlobalSource = fn(&GlobalPrincipal, &[GlobalPermissionGrant]) -> bool;

const PROJECT_SOURCES: [(GrantSource, ProjectSource); 6] = [
    (GrantSource::SystemAdmin, system_admin),
    (GrantSource::LegacyAdmin, legacy_admin),
    (GrantSource::DirectUser, direct_user),
    (GrantSource::Group, group_member),
    (GrantSource::ProjectRole, project_role),
    (GrantSource::Anyone, anyone),
];

const GLOBAL_SOURCES: [(GrantSource, GlobalSource); 4] = [
    (GrantSource::SystemAdmin, global_system_admin),
    (GrantSource::GlobalRole, global_role_member),
    (GrantSource::Group, global_group_member),
    (GrantSource::Anyone, global_open),
];

/// Fold every project grant source into one decision.
pub fn resolve_project(principal: &ProjectPrincipal, grantees: &[Grantee]) -> AccessDecision {
    PROJECT_SOURCES
        .iter()
        .find(|(_, check)| check(principal, grantees))
        .map(|(source, _)| AccessDecision::Granted(*source))
        .unwrap_or(AccessDecision::Denied)
}

/// Fold every global grant source into one decision.
pub fn resolve_global(
    principal: &GlobalPrincipal,
    grants: &[GlobalPermissionGrant],
) -> AccessDecision {
    GLOBAL_SOURCES
        .iter()
        .find(|(_, check)| check(principal, grants))
        .map(|(source, _)| AccessDecision::Granted(*source))
        .unwrap_or(AccessDecision::Denied)
}

pub fn system_admin(principal: &ProjectPrincipal, _grantees: &[Grantee]) -> bool {
    principal.is_system_admin
}

/// Backward-compatible escape hatch; redundant with `system_admin` for
/// accounts that also hold the system admin role.
pub fn legacy_admin(principal: &ProjectPrincipal, _grantees: &[Grantee]) -> bool {
    principal.is_legacy_admin
}

pub fn direct_user(principal: &ProjectPrincipal, grantees: &[Grantee]) -> bool {
    grantees
        .iter()
        .any(|g| matches!(g, Grantee::User(id) if id == &principal.user_id))
}

pub fn group_member(principal: &ProjectPrincipal, grantees: &[Grantee]) -> bool {
    grantees
        .iter()
        .any(|g| matches!(g, Grantee::Group(id) if principal.groups.contains(id)))
}

pub fn project_role(principal: &ProjectPrincipal, grantees: &[Grantee]) -> bool {
    grantees
        .iter()
        .any(|g| matches!(g, Grantee::ProjectRole(id) if principal.roles.contains(id)))
}

pub fn anyone(_principal: &ProjectPrincipal, grantees: &[Grantee]) -> bool {
    grantees.iter().any(|g| matches!(g, Grantee::Anyone))
}

fn global_system_admin(principal: &GlobalPrincipal, _grants: &[GlobalPermissionGrant]) -> bool {
    principal.is_system_admin
}

fn global_role_member(principal: &GlobalPrincipal, grants: &[GlobalPermissionGrant]) -> bool {
    grants.iter().any(|g| {
        g.global_role_id
            .as_ref()
            .map(|role| principal.global_roles.contains(role))
            .unwrap_or(false)
    })
}

fn global_group_member(principal: &GlobalPrincipal, grants: &[GlobalPermissionGrant]) -> bool {
    grants.iter().any(|g| {
        g.group_id
            .as_ref()
            .map(|group| principal.groups.contains(group))
            .unwrap_or(false)
    })
}

fn global_open(_principal: &GlobalPrincipal, grants: &[GlobalPermissionGrant]) -> bool {
    grants.iter().any(GlobalPermissionGrant::is_open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_types::{GlobalGrantId, GlobalPermission};

    fn principal() -> ProjectPrincipal {
        ProjectPrincipal::new(UserId::new("u"))
    }

    #[test]
    fn no_grants_denies() {
        assert_eq!(resolve_project(&principal(), &[]), AccessDecision::Denied);
    }

    #[test]
    fn system_admin_ignores_grants() {
        let p = ProjectPrincipal {
            is_system_admin: true,
            ..principal()
        };
        assert_eq!(
            resolve_project(&p, &[]),
            AccessDecision::Granted(GrantSource::SystemAdmin)
        );
    }

    #[test]
    fn legacy_admin_is_redundant_with_system_admin() {
        let both = ProjectPrincipal {
            is_system_admin: true,
            is_legacy_admin: true,
            ..principal()
        };
        let legacy_only = ProjectPrincipal {
            is_legacy_admin: true,
            ..principal()
        };
        // Same answer either way; only the reported source differs.
        assert!(resolve_project(&both, &[]).is_granted());
        assert!(resolve_project(&legacy_only, &[]).is_granted());
        assert_eq!(
            resolve_project(&both, &[]).source(),
            Some(GrantSource::SystemAdmin)
        );
        assert_eq!(
            resolve_project(&legacy_only, &[]).source(),
            Some(GrantSource::LegacyAdmin)
        );
    }

    #[test]
    fn direct_user_matches_only_the_caller() {
        let grantees = [Grantee::User(UserId::new("someone-else"))];
        assert!(!direct_user(&principal(), &grantees));
        let grantees = [Grantee::User(UserId::new("u"))];
        assert!(direct_user(&principal(), &grantees));
    }

    #[test]
    fn group_source_needs_membership() {
        let grantees = [Grantee::Group(GroupId::new("devs"))];
        assert!(!group_member(&principal(), &grantees));
        let mut p = principal();
        p.groups.insert(GroupId::new("devs"));
        assert!(group_member(&p, &grantees));
        assert_eq!(
            resolve_project(&p, &grantees),
            AccessDecision::Granted(GrantSource::Group)
        );
    }

    #[test]
    fn project_role_source_needs_role_in_project() {
        let grantees = [Grantee::ProjectRole(RoleId::new("developers"))];
        assert!(!project_role(&principal(), &grantees));
        let mut p = principal();
        p.roles.insert(RoleId::new("developers"));
        assert!(project_role(&p, &grantees));
    }

    #[test]
    fn anyone_source_matches_every_user() {
        assert!(anyone(&principal(), &[Grantee::Anyone]));
        assert!(!anyone(&principal(), &[Grantee::User(UserId::new("u"))]));
    }

    #[test]
    fn negative_matches_never_stop_the_walk() {
        let mut p = principal();
        p.roles.insert(RoleId::new("viewers"));
        let grantees = [
            Grantee::User(UserId::new("other")),
            Grantee::Group(GroupId::new("other")),
            Grantee::ProjectRole(RoleId::new("viewers")),
        ];
        assert_eq!(
            resolve_project(&p, &grantees),
            AccessDecision::Granted(GrantSource::ProjectRole)
        );
    }

    fn global_grant(role: Option<&str>, group: Option<&str>) -> GlobalPermissionGrant {
        GlobalPermissionGrant {
            id: GlobalGrantId::generate(),
            permission: GlobalPermission::CreateProjects,
            global_role_id: role.map(GlobalRoleId::new),
            group_id: group.map(GroupId::new),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn global_sources() {
        let mut p = GlobalPrincipal::new(UserId::new("u"));
        let role_grant = [global_grant(Some("admins"), None)];
        assert_eq!(resolve_global(&p, &role_grant), AccessDecision::Denied);
        p.global_roles.insert(GlobalRoleId::new("admins"));
        assert_eq!(
            resolve_global(&p, &role_grant),
            AccessDecision::Granted(GrantSource::GlobalRole)
        );

        let group_grant = [global_grant(None, Some("ops"))];
        p.groups.insert(GroupId::new("ops"));
        assert_eq!(
            resolve_global(&p, &group_grant),
            AccessDecision::Granted(GrantSource::Group)
        );

        let stranger = GlobalPrincipal::new(UserId::new("stranger"));
        assert_eq!(
            resolve_global(&stranger, &[global_grant(None, None)]),
            AccessDecision::Granted(GrantSource::Anyone)
        );
    }
}
