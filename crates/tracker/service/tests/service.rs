//! End-to-end: permission check, transition, notification outbox.

use std::sync::Arc;
use tracker_service::{ServiceError, TrackerConfig, TrackerService};
use tracker_storage::{
    DirectoryStore, GrantStore, InMemoryTrackerStorage, IssueStore, ProjectStore, WorkflowStore,
};
use tracker_types::{
    Grantee, Group, IssueId, IssueRecord, IssueTypeId, Permission, PermissionScheme,
    PostFunctionKind, PostFunctionRule, ProjectRecord, Recipient, SchemeMapping, Status,
    StatusCategory, StatusId, TransitionDraft, UserAccount, UserId, Workflow, WorkflowScheme,
};
use tracker_workflow::{Notification, TransitionInput};

struct Fixture {
    storage: Arc<InMemoryTrackerStorage>,
    service: TrackerService,
    outbox: tokio::sync::mpsc::Receiver<Notification>,
    issue: IssueId,
    doing: StatusId,
    alice: UserId,
    mallory: UserId,
}

/// Developers may transition; alice is a developer, mallory is not.
async fn fixture() -> Fixture {
    let storage = Arc::new(InMemoryTrackerStorage::new());

    let perms = PermissionScheme::new("Default Permission Scheme").as_default();
    let perms_id = perms.id.clone();
    storage.create_permission_scheme(perms).await.unwrap();
    let developers = Group::new("developers");
    let developers_id = developers.id.clone();
    storage.create_group(developers).await.unwrap();
    storage
        .grant(
            &perms_id,
            Permission::TransitionIssues,
            Grantee::Group(developers_id.clone()),
        )
        .await
        .unwrap();

    let alice = UserAccount::new("alice");
    let alice_id = alice.id.clone();
    storage.upsert_user(alice).await.unwrap();
    let mallory = UserAccount::new("mallory");
    let mallory_id = mallory.id.clone();
    storage.upsert_user(mallory).await.unwrap();
    storage
        .add_group_member(&developers_id, &alice_id)
        .await
        .unwrap();

    let workflow = Workflow::new("Software").as_default();
    let workflow_id = workflow.id.clone();
    storage.create_workflow(workflow).await.unwrap();
    let todo = Status::new(workflow_id.clone(), "To Do", StatusCategory::Todo, 0);
    let doing = Status::new(workflow_id.clone(), "In Progress", StatusCategory::InProgress, 1);
    let (todo_id, doing_id) = (todo.id.clone(), doing.id.clone());
    storage.upsert_status(todo).await.unwrap();
    storage.upsert_status(doing).await.unwrap();
    let start = storage
        .upsert_transition(TransitionDraft::new(
            workflow_id.clone(),
            todo_id.clone(),
            doing_id.clone(),
            "Start Progress",
        ))
        .await
        .unwrap();
    storage
        .add_post_function(PostFunctionRule::new(
            start.id.clone(),
            PostFunctionKind::SendNotification {
                event: "issue_started".to_string(),
                recipients: vec![Recipient::Reporter],
            },
            0,
        ))
        .await
        .unwrap();

    let scheme = WorkflowScheme::new("Software scheme");
    let scheme_id = scheme.id.clone();
    storage.create_workflow_scheme(scheme).await.unwrap();
    storage
        .upsert_scheme_mapping(SchemeMapping {
            scheme_id: scheme_id.clone(),
            issue_type_id: None,
            workflow_id,
        })
        .await
        .unwrap();

    let project =
        ProjectRecord::new("TRK", "Tracker", perms_id).with_workflow_scheme(scheme_id);
    let project_id = project.id.clone();
    storage.create_project(project).await.unwrap();
    let issue = IssueRecord::new(
        "TRK-1",
        project_id,
        IssueTypeId::new("bug"),
        todo_id,
        UserId::new("reporter"),
        "Login page times out",
    );
    let issue_id = issue.id.clone();
    storage
        .create_issue(issue, &UserId::new("reporter"))
        .await
        .unwrap();

    let (service, outbox) = TrackerService::with_storage(storage.clone(), &TrackerConfig::default());
    Fixture {
        storage,
        service,
        outbox,
        issue: issue_id,
        doing: doing_id,
        alice: alice_id,
        mallory: mallory_id,
    }
}

#[tokio::test]
async fn group_member_transitions_and_notifies() {
    let mut f = fixture().await;
    let result = f
        .service
        .transition_issue(&f.issue, &f.doing, &f.alice, TransitionInput::new())
        .await
        .unwrap();
    assert_eq!(result.issue.status_id, f.doing);
    assert!(!result.has_warnings());

    match f.outbox.recv().await {
        Some(Notification::Event {
            event, recipients, ..
        }) => {
            assert_eq!(event, "issue_started");
            assert_eq!(recipients, vec![UserId::new("reporter")]);
        }
        other => panic!("unexpected notification {:?}", other),
    }
}

#[tokio::test]
async fn non_member_is_denied_before_the_pipeline_runs() {
    let f = fixture().await;
    let err = f
        .service
        .transition_issue(&f.issue, &f.doing, &f.mallory, TransitionInput::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied { .. }));

    let stored = f.storage.get_issue(&f.issue).await.unwrap().unwrap();
    assert_ne!(stored.status_id, f.doing);
    assert!(f
        .service
        .available_transitions(&f.issue, &f.mallory)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn storage_outage_is_a_failed_check_not_a_denial() {
    let f = fixture().await;
    // Load the issue first so the outage hits the permission check.
    let issue = f.storage.get_issue(&f.issue).await.unwrap().unwrap();
    f.storage.set_unavailable(true);
    let err = f
        .service
        .resolver()
        .require_project_permission(&f.alice, &issue.project_id, Permission::TransitionIssues)
        .await
        .map_err(ServiceError::from)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionCheckFailed(_)));
    assert_eq!(err.user_message(), "failed to check permissions");

    let err = f
        .service
        .transition_issue(&f.issue, &f.doing, &f.alice, TransitionInput::new())
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "internal storage error");
}

#[tokio::test]
async fn rejections_surface_through_the_service() {
    let f = fixture().await;
    // No edge from To Do back to To Do.
    let todo = f.storage.get_issue(&f.issue).await.unwrap().unwrap().status_id;
    let err = f
        .service
        .transition_issue(&f.issue, &todo, &f.alice, TransitionInput::new())
        .await
        .unwrap_err();
    assert_eq!(err.rejection().map(|r| r.reason()), Some("no_such_transition"));

    let err = f
        .service
        .transition_issue(&IssueId::new("missing"), &f.doing, &f.alice, TransitionInput::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn available_transitions_for_a_developer() {
    let f = fixture().await;
    let transitions = f
        .service
        .available_transitions(&f.issue, &f.alice)
        .await
        .unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].name, "Start Progress");
}

#[test]
fn config_loads_from_file() {
    let path = std::env::temp_dir().join(format!("tracker-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        r#"
        [logging]
        filter = "tracker=debug"

        [executor]
        post_function_timeout_ms = 1500

        [notifications]
        outbox_capacity = 16
        "#,
    )
    .unwrap();
    let config = TrackerConfig::load(Some(&path)).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.logging.filter, "tracker=debug");
    assert_eq!(config.executor.post_function_timeout_ms, 1500);
    assert_eq!(config.notifications.outbox_capacity, 16);

    let (_service, _outbox) = TrackerService::new(&config);
}
