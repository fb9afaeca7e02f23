//! Closed capability sets checked by the permission resolver.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Project-scoped capability. Granted through permission schemes only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Project
    BrowseProjects,
    AdministerProjects,
    ManageSprintsBacklog,
    // Issues
    CreateIssues,
    EditIssues,
    DeleteIssues,
    AssignIssues,
    AssignableUser,
    CloseIssues,
    ResolveIssues,
    TransitionIssues,
    ScheduleIssues,
    ModifyReporter,
    LinkIssues,
    MoveIssues,
    SetIssueSecurity,
    // Comments
    AddComments,
    EditAllComments,
    EditOwnComments,
    DeleteAllComments,
    DeleteOwnComments,
    // Watchers and voters
    ManageWatchers,
    ViewWatchers,
    ViewVoters,
    // Time tracking
    WorkOnIssues,
    EditOwnWorkLogs,
    EditAllWorkLogs,
    DeleteOwnWorkLogs,
    DeleteAllWorkLogs,
}

impl Permission {
    const ALL: [Permission; 29] = [
        Permission::BrowseProjects,
        Permission::AdministerProjects,
        Permission::ManageSprintsBacklog,
        Permission::CreateIssues,
        Permission::EditIssues,
        Permission::DeleteIssues,
        Permission::AssignIssues,
        Permission::AssignableUser,
        Permission::CloseIssues,
        Permission::ResolveIssues,
        Permission::TransitionIssues,
        Permission::ScheduleIssues,
        Permission::ModifyReporter,
        Permission::LinkIssues,
        Permission::MoveIssues,
        Permission::SetIssueSecurity,
        Permission::AddComments,
        Permission::EditAllComments,
        Permission::EditOwnComments,
        Permission::DeleteAllComments,
        Permission::DeleteOwnComments,
        Permission::ManageWatchers,
        Permission::ViewWatchers,
        Permission::ViewVoters,
        Permission::WorkOnIssues,
        Permission::EditOwnWorkLogs,
        Permission::EditAllWorkLogs,
        Permission::DeleteOwnWorkLogs,
        Permission::DeleteAllWorkLogs,
    ];

    pub fn all() -> &'static [Permission] {
        &Self::ALL
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::BrowseProjects => "browse_projects",
            Permission::AdministerProjects => "administer_projects",
            Permission::ManageSprintsBacklog => "manage_sprints_backlog",
            Permission::CreateIssues => "create_issues",
            Permission::EditIssues => "edit_issues",
            Permission::DeleteIssues => "delete_issues",
            Permission::AssignIssues => "assign_issues",
            Permission::AssignableUser => "assignable_user",
            Permission::CloseIssues => "close_issues",
            Permission::ResolveIssues => "resolve_issues",
            Permission::TransitionIssues => "transition_issues",
            Permission::ScheduleIssues => "schedule_issues",
            Permission::ModifyReporter => "modify_reporter",
            Permission::LinkIssues => "link_issues",
            Permission::MoveIssues => "move_issues",
            Permission::SetIssueSecurity => "set_issue_security",
            Permission::AddComments => "add_comments",
            Permission::EditAllComments => "edit_all_comments",
            Permission::EditOwnComments => "edit_own_comments",
            Permission::DeleteAllComments => "delete_all_comments",
            Permission::DeleteOwnComments => "delete_own_comments",
            Permission::ManageWatchers => "manage_watchers",
            Permission::ViewWatchers => "view_watchers",
            Permission::ViewVoters => "view_voters",
            Permission::WorkOnIssues => "work_on_issues",
            Permission::EditOwnWorkLogs => "edit_own_work_logs",
            Permission::EditAllWorkLogs => "edit_all_work_logs",
            Permission::DeleteOwnWorkLogs => "delete_own_work_logs",
            Permission::DeleteAllWorkLogs => "delete_all_work_logs",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| ParseError::UnknownPermission(value.to_string()))
    }
}

/// System-wide capability, evaluated without a project context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalPermission {
    AdministerSystem,
    AdministerJira,
    ManageUsers,
    ManageGroups,
    CreateProjects,
    BrowseUsers,
    ShareDashboards,
    ManageFilters,
    BulkChange,
}

impl GlobalPermission {
    const ALL: [GlobalPermission; 9] = [
        GlobalPermission::AdministerSystem,
        GlobalPermission::AdministerJira,
        GlobalPermission::ManageUsers,
        GlobalPermission::ManageGroups,
        GlobalPermission::CreateProjects,
        GlobalPermission::BrowseUsers,
        GlobalPermission::ShareDashboards,
        GlobalPermission::ManageFilters,
        GlobalPermission::BulkChange,
    ];

    pub fn all() -> &'static [GlobalPermission] {
        &Self::ALL
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalPermission::AdministerSystem => "administer_system",
            GlobalPermission::AdministerJira => "administer_jira",
            GlobalPermission::ManageUsers => "manage_users",
            GlobalPermission::ManageGroups => "manage_groups",
            GlobalPermission::CreateProjects => "create_projects",
            GlobalPermission::BrowseUsers => "browse_users",
            GlobalPermission::ShareDashboards => "share_dashboards",
            GlobalPermission::ManageFilters => "manage_filters",
            GlobalPermission::BulkChange => "bulk_change",
        }
    }
}

impl std::fmt::Display for GlobalPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalPermission {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| ParseError::UnknownPermission(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn wire_names_match_serde() {
        for permission in Permission::all() {
            let json = serde_json::to_string(permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), *permission);
        }
        for permission in GlobalPermission::all() {
            let json = serde_json::to_string(permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
        }
    }

    #[test]
    fn catalogue_has_no_duplicates() {
        let names: HashSet<_> = Permission::all().iter().map(|p| p.as_str()).collect();
        assert_eq!(names.len(), 29);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            "fly_to_moon".parse::<Permission>(),
            Err(ParseError::UnknownPermission(name)) if name == "fly_to_moon"
        ));
        assert!("edit_issues".parse::<GlobalPermission>().is_err());
    }
}
