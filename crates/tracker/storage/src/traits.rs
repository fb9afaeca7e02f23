use crate::model::{FieldUpdate, TransitionCommit};
use crate::StorageResult;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracker_types::{
    Actor, Comment, ConditionRule, DefaultRoleActor, FieldRef, GlobalGrantId, GlobalPermission,
    GlobalPermissionGrant, GlobalRole, GlobalRoleId, GlobalRoleKind, Grantee, Group, GroupId,
    IssueId, IssueRecord, IssueTypeId, Permission, PermissionScheme, PermissionSchemeId,
    PostFunctionRule, ProjectId, ProjectRecord, ProjectRole, RoleActor, RoleId, RuleId,
    SchemeGrant, SchemeMapping, Screen, ScreenField, ScreenId, Status, StatusChange, StatusId,
    Transition, TransitionDraft, TransitionId, UserAccount, UserId, ValidatorRule, Workflow,
    WorkflowId, WorkflowScheme, WorkflowSchemeId,
};

/// Users and the flat user/group membership relation.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn upsert_user(&self, user: UserAccount) -> StorageResult<()>;
    async fn get_user(&self, user_id: &UserId) -> StorageResult<Option<UserAccount>>;

    async fn create_group(&self, group: Group) -> StorageResult<()>;
    async fn get_group(&self, group_id: &GroupId) -> StorageResult<Option<Group>>;

    /// Returns `true` if the membership was newly added.
    async fn add_group_member(&self, group_id: &GroupId, user_id: &UserId) -> StorageResult<bool>;
    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> StorageResult<bool>;
    async fn list_group_members(&self, group_id: &GroupId) -> StorageResult<Vec<UserId>>;

    /// Groups the user belongs to directly. Groups never nest.
    async fn list_groups_for_user(&self, user_id: &UserId) -> StorageResult<BTreeSet<GroupId>>;
}

/// Project rows as far as the authorization core needs them.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, project: ProjectRecord) -> StorageResult<()>;
    async fn get_project(&self, project_id: &ProjectId) -> StorageResult<Option<ProjectRecord>>;
    async fn set_permission_scheme(
        &self,
        project_id: &ProjectId,
        scheme_id: &PermissionSchemeId,
    ) -> StorageResult<()>;
    async fn set_workflow_scheme(
        &self,
        project_id: &ProjectId,
        scheme_id: Option<&WorkflowSchemeId>,
    ) -> StorageResult<()>;
}

/// Permission schemes, their grants, and global permission grants.
///
/// Grants are additive facts keyed by `(scheme, permission, grantee)`;
/// duplicate grants are upserts, never new rows.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn create_permission_scheme(&self, scheme: PermissionScheme) -> StorageResult<()>;
    async fn get_permission_scheme(
        &self,
        scheme_id: &PermissionSchemeId,
    ) -> StorageResult<Option<PermissionScheme>>;
    /// Default scheme first, then by name.
    async fn list_permission_schemes(&self) -> StorageResult<Vec<PermissionScheme>>;
    async fn default_permission_scheme(&self) -> StorageResult<Option<PermissionScheme>>;

    /// Idempotent: re-granting an existing fact returns the stored row.
    async fn grant(
        &self,
        scheme_id: &PermissionSchemeId,
        permission: Permission,
        grantee: Grantee,
    ) -> StorageResult<SchemeGrant>;
    /// Returns `true` if a grant was removed.
    async fn revoke(
        &self,
        scheme_id: &PermissionSchemeId,
        permission: Permission,
        grantee: &Grantee,
    ) -> StorageResult<bool>;
    /// Ordered by permission name, then grantee.
    async fn list_scheme_grants(
        &self,
        scheme_id: &PermissionSchemeId,
    ) -> StorageResult<Vec<SchemeGrant>>;
    async fn list_grantees(
        &self,
        scheme_id: &PermissionSchemeId,
        permission: Permission,
    ) -> StorageResult<Vec<Grantee>>;

    async fn grant_global_permission(
        &self,
        permission: GlobalPermission,
        global_role_id: Option<GlobalRoleId>,
        group_id: Option<GroupId>,
    ) -> StorageResult<GlobalPermissionGrant>;
    async fn revoke_global_permission(&self, grant_id: &GlobalGrantId) -> StorageResult<bool>;
    async fn list_global_grants(
        &self,
        permission: GlobalPermission,
    ) -> StorageResult<Vec<GlobalPermissionGrant>>;
}

/// Project roles with per-project actors, default actors, and global roles.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn create_project_role(&self, role: ProjectRole) -> StorageResult<()>;
    async fn get_project_role(&self, role_id: &RoleId) -> StorageResult<Option<ProjectRole>>;
    /// Ordered by name.
    async fn list_project_roles(&self) -> StorageResult<Vec<ProjectRole>>;

    async fn add_role_actor(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        actor: Actor,
    ) -> StorageResult<bool>;
    async fn remove_role_actor(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
        actor: &Actor,
    ) -> StorageResult<bool>;
    async fn list_role_actors(
        &self,
        project_id: &ProjectId,
        role_id: &RoleId,
    ) -> StorageResult<Vec<Actor>>;
    /// Every actor row of one project, across all roles.
    async fn list_project_actors(&self, project_id: &ProjectId) -> StorageResult<Vec<RoleActor>>;

    async fn add_default_actor(&self, role_id: &RoleId, actor: Actor) -> StorageResult<bool>;
    async fn remove_default_actor(&self, role_id: &RoleId, actor: &Actor) -> StorageResult<bool>;
    async fn list_default_actors(&self) -> StorageResult<Vec<DefaultRoleActor>>;
    /// Set-union insert of every default actor into the project. Returns the
    /// number of rows that were not already present. The project is not
    /// looked up here; callers check it exists.
    async fn copy_default_actors_to_project(&self, project_id: &ProjectId) -> StorageResult<usize>;

    async fn create_global_role(&self, role: GlobalRole) -> StorageResult<()>;
    async fn get_global_role(&self, kind: GlobalRoleKind) -> StorageResult<Option<GlobalRole>>;
    async fn add_global_role_member(
        &self,
        role_id: &GlobalRoleId,
        user_id: &UserId,
    ) -> StorageResult<bool>;
    async fn remove_global_role_member(
        &self,
        role_id: &GlobalRoleId,
        user_id: &UserId,
    ) -> StorageResult<bool>;
    async fn list_global_roles_for_user(&self, user_id: &UserId) -> StorageResult<Vec<GlobalRole>>;
}

/// Workflow graphs, transition pipelines, screens and workflow schemes.
///
/// Deletes cascade: a workflow owns its statuses and transitions, and a
/// transition owns its conditions, validators and post-functions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_workflow(&self, workflow: Workflow) -> StorageResult<()>;
    async fn get_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<Option<Workflow>>;
    async fn list_workflows(&self) -> StorageResult<Vec<Workflow>>;
    /// Fails with `Conflict` while a workflow scheme still maps to it.
    async fn delete_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<bool>;

    async fn upsert_status(&self, status: Status) -> StorageResult<()>;
    async fn get_status(&self, status_id: &StatusId) -> StorageResult<Option<Status>>;
    /// Ordered by position.
    async fn list_statuses(&self, workflow_id: &WorkflowId) -> StorageResult<Vec<Status>>;
    async fn delete_status(&self, status_id: &StatusId) -> StorageResult<bool>;

    /// Insert or rename the unique edge `(workflow, from, to)`.
    async fn upsert_transition(&self, draft: TransitionDraft) -> StorageResult<Transition>;
    async fn get_transition(&self, transition_id: &TransitionId)
        -> StorageResult<Option<Transition>>;
    async fn find_transition(
        &self,
        workflow_id: &WorkflowId,
        from_status: &StatusId,
        to_status: &StatusId,
    ) -> StorageResult<Option<Transition>>;
    async fn list_transitions(&self, workflow_id: &WorkflowId) -> StorageResult<Vec<Transition>>;
    async fn delete_transition(&self, transition_id: &TransitionId) -> StorageResult<bool>;

    async fn add_condition(&self, rule: ConditionRule) -> StorageResult<()>;
    /// Ascending position; ties keep insertion order.
    async fn list_conditions(&self, transition_id: &TransitionId)
        -> StorageResult<Vec<ConditionRule>>;
    async fn delete_condition(&self, rule_id: &RuleId) -> StorageResult<bool>;

    async fn add_validator(&self, rule: ValidatorRule) -> StorageResult<()>;
    async fn list_validators(&self, transition_id: &TransitionId)
        -> StorageResult<Vec<ValidatorRule>>;
    async fn delete_validator(&self, rule_id: &RuleId) -> StorageResult<bool>;

    async fn add_post_function(&self, rule: PostFunctionRule) -> StorageResult<()>;
    async fn list_post_functions(
        &self,
        transition_id: &TransitionId,
    ) -> StorageResult<Vec<PostFunctionRule>>;
    async fn delete_post_function(&self, rule_id: &RuleId) -> StorageResult<bool>;

    async fn create_screen(&self, screen: Screen) -> StorageResult<()>;
    async fn get_screen(&self, screen_id: &ScreenId) -> StorageResult<Option<Screen>>;
    /// Keyed by `(screen, field)`.
    async fn upsert_screen_field(&self, field: ScreenField) -> StorageResult<()>;
    async fn remove_screen_field(&self, screen_id: &ScreenId, field: &FieldRef)
        -> StorageResult<bool>;
    /// Ordered by position.
    async fn list_screen_fields(&self, screen_id: &ScreenId) -> StorageResult<Vec<ScreenField>>;

    async fn create_workflow_scheme(&self, scheme: WorkflowScheme) -> StorageResult<()>;
    async fn get_workflow_scheme(
        &self,
        scheme_id: &WorkflowSchemeId,
    ) -> StorageResult<Option<WorkflowScheme>>;
    /// Keyed by `(scheme, issue type?)`.
    async fn upsert_scheme_mapping(&self, mapping: SchemeMapping) -> StorageResult<()>;
    async fn remove_scheme_mapping(
        &self,
        scheme_id: &WorkflowSchemeId,
        issue_type_id: Option<&IssueTypeId>,
    ) -> StorageResult<bool>;
    async fn list_scheme_mappings(
        &self,
        scheme_id: &WorkflowSchemeId,
    ) -> StorageResult<Vec<SchemeMapping>>;
}

/// Issue rows with optimistic status updates.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Also records the initial status in the issue's history.
    async fn create_issue(&self, issue: IssueRecord, created_by: &UserId) -> StorageResult<()>;
    async fn get_issue(&self, issue_id: &IssueId) -> StorageResult<Option<IssueRecord>>;
    async fn list_subtasks(&self, parent_id: &IssueId) -> StorageResult<Vec<IssueRecord>>;

    /// Compare-and-swap the status together with the submitted fields,
    /// resolution and comment.
    async fn commit_transition(&self, commit: TransitionCommit) -> StorageResult<IssueRecord>;

    /// Plain field writes outside a transition. All or nothing.
    async fn update_fields(
        &self,
        issue_id: &IssueId,
        updates: Vec<FieldUpdate>,
    ) -> StorageResult<IssueRecord>;

    async fn add_comment(&self, comment: Comment) -> StorageResult<()>;
    /// Oldest first.
    async fn list_comments(&self, issue_id: &IssueId) -> StorageResult<Vec<Comment>>;
    /// Oldest first.
    async fn status_history(&self, issue_id: &IssueId) -> StorageResult<Vec<StatusChange>>;
}

/// Unified storage bundle consumed by the access and workflow layers.
pub trait TrackerStorage:
    DirectoryStore + ProjectStore + GrantStore + RoleStore + WorkflowStore + IssueStore + Send + Sync
{
}

impl<T> TrackerStorage for T where
    T: DirectoryStore
        + ProjectStore
        + GrantStore
        + RoleStore
        + WorkflowStore
        + IssueStore
        + Send
        + Sync
{
}
