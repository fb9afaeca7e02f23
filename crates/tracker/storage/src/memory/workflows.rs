use super::{remove_where, InMemoryTrackerStorage};
use crate::traits::WorkflowStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tracker_types::{
    ConditionRule, FieldRef, IssueTypeId, PostFunctionRule, RuleId, SchemeMapping, Screen,
    ScreenField, ScreenId, Status, StatusId, Transition, TransitionDraft, TransitionId,
    ValidatorRule, Workflow, WorkflowId, WorkflowScheme, WorkflowSchemeId,
};

#[derive(Default)]
pub(super) struct WorkflowTables {
    workflows: HashMap<WorkflowId, Workflow>,
    statuses: HashMap<StatusId, Status>,
    transitions: HashMap<TransitionId, Transition>,
    conditions: Vec<ConditionRule>,
    validators: Vec<ValidatorRule>,
    post_functions: Vec<PostFunctionRule>,
    screens: HashMap<ScreenId, Screen>,
    screen_fields: Vec<ScreenField>,
    schemes: HashMap<WorkflowSchemeId, WorkflowScheme>,
    mappings: Vec<SchemeMapping>,
}

impl WorkflowTables {
    fn require_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<()> {
        if self.workflows.contains_key(workflow_id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!(
                "workflow {} not found",
                workflow_id
            )))
        }
    }

    fn require_transition(&self, transition_id: &TransitionId) -> StorageResult<()> {
        if self.transitions.contains_key(transition_id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!(
                "transition {} not found",
                transition_id
            )))
        }
    }

    fn status_in_workflow(&self, status_id: &StatusId, workflow_id: &WorkflowId) -> bool {
        self.statuses
            .get(status_id)
            .map(|s| &s.workflow_id == workflow_id)
            .unwrap_or(false)
    }

    /// Drop a transition together with every rule it owns.
    fn cascade_transition(&mut self, transition_id: &TransitionId) -> bool {
        let removed = self.transitions.remove(transition_id).is_some();
        self.conditions.retain(|r| &r.transition_id != transition_id);
        self.validators.retain(|r| &r.transition_id != transition_id);
        self.post_functions
            .retain(|r| &r.transition_id != transition_id);
        removed
    }
}

/// Stable sort by position: rows with equal positions keep insertion order.
fn by_position<T>(mut rows: Vec<T>, position: impl Fn(&T) -> i32) -> Vec<T> {
    rows.sort_by_key(|row| position(row));
    rows
}

#[async_trait]
impl WorkflowStore for InMemoryTrackerStorage {
    async fn create_workflow(&self, workflow: Workflow) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if tables.workflows.contains_key(&workflow.id) {
            return Err(StorageError::Conflict(format!(
                "workflow {} already exists",
                workflow.id
            )));
        }
        tables.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<Option<Workflow>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables.workflows.get(workflow_id).cloned())
    }

    async fn list_workflows(&self) -> StorageResult<Vec<Workflow>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let mut workflows = tables.workflows.values().cloned().collect::<Vec<_>>();
        workflows.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.name.cmp(&b.name)));
        Ok(workflows)
    }

    async fn delete_workflow(&self, workflow_id: &WorkflowId) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if tables.mappings.iter().any(|m| &m.workflow_id == workflow_id) {
            return Err(StorageError::Conflict(format!(
                "workflow {} is still mapped by a workflow scheme",
                workflow_id
            )));
        }
        if tables.workflows.remove(workflow_id).is_none() {
            return Ok(false);
        }
        let owned = tables
            .transitions
            .values()
            .filter(|t| &t.workflow_id == workflow_id)
            .map(|t| t.id.clone())
            .collect::<Vec<_>>();
        for transition_id in &owned {
            tables.cascade_transition(transition_id);
        }
        tables.statuses.retain(|_, s| &s.workflow_id != workflow_id);
        Ok(true)
    }

    async fn upsert_status(&self, status: Status) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        tables.require_workflow(&status.workflow_id)?;
        if let Some(existing) = tables.statuses.get(&status.id) {
            if existing.workflow_id != status.workflow_id {
                return Err(StorageError::InvalidInput(format!(
                    "status {} belongs to workflow {}",
                    status.id, existing.workflow_id
                )));
            }
        }
        tables.statuses.insert(status.id.clone(), status);
        Ok(())
    }

    async fn get_status(&self, status_id: &StatusId) -> StorageResult<Option<Status>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables.statuses.get(status_id).cloned())
    }

    async fn list_statuses(&self, workflow_id: &WorkflowId) -> StorageResult<Vec<Status>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let mut statuses = tables
            .statuses
            .values()
            .filter(|s| &s.workflow_id == workflow_id)
            .cloned()
            .collect::<Vec<_>>();
        statuses.sort_by(|a, b| a.position.cmp(&b.position).then(a.name.cmp(&b.name)));
        Ok(statuses)
    }

    async fn delete_status(&self, status_id: &StatusId) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if tables.statuses.remove(status_id).is_none() {
            return Ok(false);
        }
        let touching = tables
            .transitions
            .values()
            .filter(|t| &t.from_status == status_id || &t.to_status == status_id)
            .map(|t| t.id.clone())
            .collect::<Vec<_>>();
        for transition_id in &touching {
            tables.cascade_transition(transition_id);
        }
        Ok(true)
    }

    async fn upsert_transition(&self, draft: TransitionDraft) -> StorageResult<Transition> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        tables.require_workflow(&draft.workflow_id)?;
        for status_id in [&draft.from_status, &draft.to_status] {
            if !tables.status_in_workflow(status_id, &draft.workflow_id) {
                return Err(StorageError::InvalidInput(format!(
                    "status {} is not part of workflow {}",
                    status_id, draft.workflow_id
                )));
            }
        }
        if let Some(screen_id) = &draft.screen_id {
            if !tables.screens.contains_key(screen_id) {
                return Err(StorageError::NotFound(format!("screen {} not found", screen_id)));
            }
        }

        if let Some(existing) = tables.transitions.values_mut().find(|t| {
            t.workflow_id == draft.workflow_id
                && t.from_status == draft.from_status
                && t.to_status == draft.to_status
        }) {
            existing.name = draft.name;
            existing.screen_id = draft.screen_id;
            return Ok(existing.clone());
        }

        let transition = Transition {
            id: TransitionId::generate(),
            workflow_id: draft.workflow_id,
            from_status: draft.from_status,
            to_status: draft.to_status,
            name: draft.name,
            screen_id: draft.screen_id,
        };
        tables
            .transitions
            .insert(transition.id.clone(), transition.clone());
        Ok(transition)
    }

    async fn get_transition(
        &self,
        transition_id: &TransitionId,
    ) -> StorageResult<Option<Transition>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables.transitions.get(transition_id).cloned())
    }

    async fn find_transition(
        &self,
        workflow_id: &WorkflowId,
        from_status: &StatusId,
        to_status: &StatusId,
    ) -> StorageResult<Option<Transition>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables
            .transitions
            .values()
            .find(|t| {
                &t.workflow_id == workflow_id
                    && &t.from_status == from_status
                    && &t.to_status == to_status
            })
            .cloned())
    }

    async fn list_transitions(&self, workflow_id: &WorkflowId) -> StorageResult<Vec<Transition>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let mut transitions = tables
            .transitions
            .values()
            .filter(|t| &t.workflow_id == workflow_id)
            .cloned()
            .collect::<Vec<_>>();
        transitions.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(transitions)
    }

    async fn delete_transition(&self, transition_id: &TransitionId) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        Ok(tables.cascade_transition(transition_id))
    }

    async fn add_condition(&self, rule: ConditionRule) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        tables.require_transition(&rule.transition_id)?;
        tables.conditions.push(rule);
        Ok(())
    }

    async fn list_conditions(
        &self,
        transition_id: &TransitionId,
    ) -> StorageResult<Vec<ConditionRule>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let rules = tables
            .conditions
            .iter()
            .filter(|r| &r.transition_id == transition_id)
            .cloned()
            .collect();
        Ok(by_position(rules, |r: &ConditionRule| r.position))
    }

    async fn delete_condition(&self, rule_id: &RuleId) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        Ok(remove_where(&mut tables.conditions, |r| &r.id == rule_id))
    }

    async fn add_validator(&self, rule: ValidatorRule) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        tables.require_transition(&rule.transition_id)?;
        tables.validators.push(rule);
        Ok(())
    }

    async fn list_validators(
        &self,
        transition_id: &TransitionId,
    ) -> StorageResult<Vec<ValidatorRule>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let rules = tables
            .validators
            .iter()
            .filter(|r| &r.transition_id == transition_id)
            .cloned()
            .collect();
        Ok(by_position(rules, |r: &ValidatorRule| r.position))
    }

    async fn delete_validator(&self, rule_id: &RuleId) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        Ok(remove_where(&mut tables.validators, |r| &r.id == rule_id))
    }

    async fn add_post_function(&self, rule: PostFunctionRule) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        tables.require_transition(&rule.transition_id)?;
        tables.post_functions.push(rule);
        Ok(())
    }

    async fn list_post_functions(
        &self,
        transition_id: &TransitionId,
    ) -> StorageResult<Vec<PostFunctionRule>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let rules = tables
            .post_functions
            .iter()
            .filter(|r| &r.transition_id == transition_id)
            .cloned()
            .collect();
        Ok(by_position(rules, |r: &PostFunctionRule| r.position))
    }

    async fn delete_post_function(&self, rule_id: &RuleId) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        Ok(remove_where(&mut tables.post_functions, |r| &r.id == rule_id))
    }

    async fn create_screen(&self, screen: Screen) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if tables.screens.contains_key(&screen.id) {
            return Err(StorageError::Conflict(format!(
                "screen {} already exists",
                screen.id
            )));
        }
        tables.screens.insert(screen.id.clone(), screen);
        Ok(())
    }

    async fn get_screen(&self, screen_id: &ScreenId) -> StorageResult<Option<Screen>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables.screens.get(screen_id).cloned())
    }

    async fn upsert_screen_field(&self, field: ScreenField) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if !tables.screens.contains_key(&field.screen_id) {
            return Err(StorageError::NotFound(format!(
                "screen {} not found",
                field.screen_id
            )));
        }
        match tables
            .screen_fields
            .iter_mut()
            .find(|f| f.screen_id == field.screen_id && f.field == field.field)
        {
            Some(existing) => *existing = field,
            None => tables.screen_fields.push(field),
        }
        Ok(())
    }

    async fn remove_screen_field(
        &self,
        screen_id: &ScreenId,
        field: &FieldRef,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        Ok(remove_where(&mut tables.screen_fields, |f| {
            &f.screen_id == screen_id && &f.field == field
        }))
    }

    async fn list_screen_fields(&self, screen_id: &ScreenId) -> StorageResult<Vec<ScreenField>> {
        let tables = self.read(&self.workflows, "workflows")?;
        let fields = tables
            .screen_fields
            .iter()
            .filter(|f| &f.screen_id == screen_id)
            .cloned()
            .collect();
        Ok(by_position(fields, |f: &ScreenField| f.position))
    }

    async fn create_workflow_scheme(&self, scheme: WorkflowScheme) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if tables.schemes.contains_key(&scheme.id) {
            return Err(StorageError::Conflict(format!(
                "workflow scheme {} already exists",
                scheme.id
            )));
        }
        tables.schemes.insert(scheme.id.clone(), scheme);
        Ok(())
    }

    async fn get_workflow_scheme(
        &self,
        scheme_id: &WorkflowSchemeId,
    ) -> StorageResult<Option<WorkflowScheme>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables.schemes.get(scheme_id).cloned())
    }

    async fn upsert_scheme_mapping(&self, mapping: SchemeMapping) -> StorageResult<()> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        if !tables.schemes.contains_key(&mapping.scheme_id) {
            return Err(StorageError::NotFound(format!(
                "workflow scheme {} not found",
                mapping.scheme_id
            )));
        }
        tables.require_workflow(&mapping.workflow_id)?;
        match tables.mappings.iter_mut().find(|m| {
            m.scheme_id == mapping.scheme_id && m.issue_type_id == mapping.issue_type_id
        }) {
            Some(existing) => existing.workflow_id = mapping.workflow_id,
            None => tables.mappings.push(mapping),
        }
        Ok(())
    }

    async fn remove_scheme_mapping(
        &self,
        scheme_id: &WorkflowSchemeId,
        issue_type_id: Option<&IssueTypeId>,
    ) -> StorageResult<bool> {
        let mut tables = self.write(&self.workflows, "workflows")?;
        Ok(remove_where(&mut tables.mappings, |m| {
            &m.scheme_id == scheme_id && m.issue_type_id.as_ref() == issue_type_id
        }))
    }

    async fn list_scheme_mappings(
        &self,
        scheme_id: &WorkflowSchemeId,
    ) -> StorageResult<Vec<SchemeMapping>> {
        let tables = self.read(&self.workflows, "workflows")?;
        Ok(tables
            .mappings
            .iter()
            .filter(|m| &m.scheme_id == scheme_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_types::{
        ConditionKind, PostFunctionKind, StatusCategory, ValidatorKind,
    };

    struct Fixture {
        store: InMemoryTrackerStorage,
        workflow: WorkflowId,
        todo: StatusId,
        doing: StatusId,
        done: StatusId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryTrackerStorage::new();
        let workflow = Workflow::new("Software");
        let workflow_id = workflow.id.clone();
        store.create_workflow(workflow).await.unwrap();
        let todo = Status::new(workflow_id.clone(), "To Do", StatusCategory::Todo, 0);
        let doing = Status::new(workflow_id.clone(), "In Progress", StatusCategory::InProgress, 1);
        let done = Status::new(workflow_id.clone(), "Done", StatusCategory::Done, 2);
        let ids = (todo.id.clone(), doing.id.clone(), done.id.clone());
        for status in [done, todo, doing] {
            store.upsert_status(status).await.unwrap();
        }
        Fixture {
            store,
            workflow: workflow_id,
            todo: ids.0,
            doing: ids.1,
            done: ids.2,
        }
    }

    #[tokio::test]
    async fn statuses_list_by_position() {
        let f = fixture().await;
        let names = f
            .store
            .list_statuses(&f.workflow)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
    }

    #[tokio::test]
    async fn duplicate_transition_insert_is_an_upsert() {
        let f = fixture().await;
        let first = f
            .store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.todo.clone(),
                f.doing.clone(),
                "Start",
            ))
            .await
            .unwrap();
        let second = f
            .store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.todo.clone(),
                f.doing.clone(),
                "Start Progress",
            ))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Start Progress");
        assert_eq!(f.store.list_transitions(&f.workflow).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transition_endpoints_must_belong_to_workflow() {
        let f = fixture().await;
        let err = f
            .store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.todo.clone(),
                StatusId::new("elsewhere"),
                "Jump",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn transition_screen_must_exist() {
        let f = fixture().await;
        let draft = TransitionDraft::new(f.workflow.clone(), f.doing.clone(), f.done.clone(), "Resolve");
        let err = f
            .store
            .upsert_transition(draft.clone().with_screen(ScreenId::new("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(f.store.list_transitions(&f.workflow).await.unwrap().is_empty());

        let screen = Screen::new("Resolve");
        let screen_id = screen.id.clone();
        f.store.create_screen(screen).await.unwrap();
        let transition = f
            .store
            .upsert_transition(draft.with_screen(screen_id.clone()))
            .await
            .unwrap();
        assert_eq!(transition.screen_id, Some(screen_id));
    }

    #[tokio::test]
    async fn deleting_transition_cascades_to_rules() {
        let f = fixture().await;
        let transition = f
            .store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.doing.clone(),
                f.done.clone(),
                "Resolve",
            ))
            .await
            .unwrap();
        f.store
            .add_condition(ConditionRule::new(
                transition.id.clone(),
                ConditionKind::OnlyAssignee,
                0,
            ))
            .await
            .unwrap();
        f.store
            .add_validator(ValidatorRule::new(
                transition.id.clone(),
                ValidatorKind::ResolutionSet,
                0,
            ))
            .await
            .unwrap();
        f.store
            .add_post_function(PostFunctionRule::new(
                transition.id.clone(),
                PostFunctionKind::AssignToReporter,
                0,
            ))
            .await
            .unwrap();

        assert!(f.store.delete_transition(&transition.id).await.unwrap());
        assert!(f.store.list_conditions(&transition.id).await.unwrap().is_empty());
        assert!(f.store.list_validators(&transition.id).await.unwrap().is_empty());
        assert!(f
            .store
            .list_post_functions(&transition.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_status_drops_touching_transitions() {
        let f = fixture().await;
        f.store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.todo.clone(),
                f.doing.clone(),
                "Start",
            ))
            .await
            .unwrap();
        f.store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.todo.clone(),
                f.done.clone(),
                "Close",
            ))
            .await
            .unwrap();
        f.store.delete_status(&f.doing).await.unwrap();
        let remaining = f.store.list_transitions(&f.workflow).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Close");
    }

    #[tokio::test]
    async fn rules_keep_insertion_order_on_position_ties() {
        let f = fixture().await;
        let transition = f
            .store
            .upsert_transition(TransitionDraft::new(
                f.workflow.clone(),
                f.todo.clone(),
                f.doing.clone(),
                "Start",
            ))
            .await
            .unwrap();
        let late = ConditionRule::new(transition.id.clone(), ConditionKind::OnlyReporter, 5);
        let tie_a = ConditionRule::new(transition.id.clone(), ConditionKind::OnlyAssignee, 1);
        let tie_b = ConditionRule::new(transition.id.clone(), ConditionKind::SubtasksResolved, 1);
        let expected = vec![tie_a.id.clone(), tie_b.id.clone(), late.id.clone()];
        for rule in [late, tie_a, tie_b] {
            f.store.add_condition(rule).await.unwrap();
        }
        let ids = f
            .store
            .list_conditions(&transition.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn mapped_workflow_cannot_be_deleted() {
        let f = fixture().await;
        let scheme = WorkflowScheme::new("Default");
        let scheme_id = scheme.id.clone();
        f.store.create_workflow_scheme(scheme).await.unwrap();
        f.store
            .upsert_scheme_mapping(SchemeMapping {
                scheme_id: scheme_id.clone(),
                issue_type_id: None,
                workflow_id: f.workflow.clone(),
            })
            .await
            .unwrap();
        let err = f.store.delete_workflow(&f.workflow).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        assert!(f
            .store
            .remove_scheme_mapping(&scheme_id, None)
            .await
            .unwrap());
        assert!(f.store.delete_workflow(&f.workflow).await.unwrap());
        assert!(f.store.list_statuses(&f.workflow).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheme_mapping_upsert_replaces_workflow() {
        let f = fixture().await;
        let other = Workflow::new("Support");
        let other_id = other.id.clone();
        f.store.create_workflow(other).await.unwrap();
        let scheme = WorkflowScheme::new("Mixed");
        let scheme_id = scheme.id.clone();
        f.store.create_workflow_scheme(scheme).await.unwrap();
        let bug = IssueTypeId::new("bug");
        for workflow_id in [f.workflow.clone(), other_id.clone()] {
            f.store
                .upsert_scheme_mapping(SchemeMapping {
                    scheme_id: scheme_id.clone(),
                    issue_type_id: Some(bug.clone()),
                    workflow_id,
                })
                .await
                .unwrap();
        }
        let mappings = f.store.list_scheme_mappings(&scheme_id).await.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].workflow_id, other_id);
    }
}
