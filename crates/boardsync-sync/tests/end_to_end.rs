//! Import and sync walks against the in-memory tracker and SQLite.

mod common;

use std::sync::Arc;
use std::time::Duration;

use boardsync_core::project::{CreateProject, TaskSource};
use boardsync_core::remote::{RemoteCard, RemoteCredential, RemoteLabel};
use boardsync_core::task::{Priority, Status};
use boardsync_core::task_meta::RemoteState;
use boardsync_db::{Database, SqliteDatabase};
use boardsync_sync::{CardAction, PushAction, PushOutcome, SyncConfig, SyncEngine, SyncError};
use boardsync_trello::mock::{Failure, MockTracker};
use boardsync_trello::Operation;

const OWNER: &str = "user-1";

fn cred() -> RemoteCredential {
    RemoteCredential::new("key", "token")
}

fn card(id: &str, name: &str) -> RemoteCard {
    RemoteCard {
        id: id.into(),
        name: name.into(),
        desc: None,
        due: None,
        closed: false,
        labels: Vec::new(),
        short_url: Some(format!("https://trello.com/c/{id}")),
        id_list: None,
    }
}

fn labelled(id: &str, name: &str, label: &str) -> RemoteCard {
    RemoteCard {
        labels: vec![RemoteLabel {
            id: format!("lab-{id}"),
            name: label.into(),
            color: None,
        }],
        ..card(id, name)
    }
}

fn closed(id: &str, name: &str) -> RemoteCard {
    RemoteCard {
        closed: true,
        ..card(id, name)
    }
}

/// Board B1: open list L1 with C1 and C2 (archived), closed list L2 with C3.
fn scenario_tracker() -> MockTracker {
    MockTracker::new()
        .with_board("B1", "Roadmap")
        .with_list("B1", "L1", "Todo", false)
        .with_list("B1", "L2", "Old", true)
        .with_card("L1", labelled("C1", "Fix bug", "High Priority"))
        .with_card("L1", closed("C2", "Docs"))
        .with_card("L2", card("C3", "Ancient"))
}

struct Harness {
    db: Arc<dyn Database>,
    tracker: Arc<MockTracker>,
    engine: SyncEngine,
}

fn harness(tracker: MockTracker) -> Harness {
    harness_with(tracker, SyncConfig::default())
}

fn harness_with(tracker: MockTracker, config: SyncConfig) -> Harness {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let tracker = Arc::new(tracker);
    let engine = SyncEngine::new(db.clone(), tracker.clone(), config);
    Harness { db, tracker, engine }
}

#[tokio::test]
async fn board_scenario_imports_open_cards_only() {
    let h = harness(scenario_tracker());
    let (project, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();

    assert_eq!(project.source, TaskSource::Trello);
    assert_eq!(project.remote_board_id.as_deref(), Some("B1"));
    assert_eq!(report.imported_count, 2);
    assert_eq!(report.updated_count, 0);

    let linked = h.engine.list_project_tasks(&project.id).await.unwrap();
    assert_eq!(linked.len(), 2);

    let by_card = |card_id: &str| {
        linked
            .iter()
            .find(|l| l.meta.as_ref().and_then(|m| m.remote_card_id.as_deref()) == Some(card_id))
            .cloned()
    };
    let c1 = by_card("C1").unwrap();
    assert_eq!(c1.task.priority, Priority::High);
    assert_eq!(c1.task.status, Status::Pending);
    assert!(c1.task.is_imported);

    let c2 = by_card("C2").unwrap();
    assert_eq!(c2.task.status, Status::Completed);
    assert_eq!(c2.meta.unwrap().remote_state, RemoteState::Archived);

    assert!(by_card("C3").is_none());
    assert!(linked.iter().all(|l| l.task.title != "Ancient"));
    assert_eq!(h.tracker.count(Operation::FetchCards), 1);
}

#[tokio::test]
async fn reimport_is_idempotent() {
    let h = harness(scenario_tracker());
    let (first, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let (second, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(report.imported_count, 0);
    assert_eq!(report.updated_count, 2);
    assert_eq!(h.db.list_projects(OWNER).await.unwrap().len(), 1);
    assert_eq!(h.engine.list_project_tasks(&first.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reimport_picks_up_upstream_changes() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();

    h.tracker.edit_card("C1", |c| c.desc = Some("root cause found".into()));
    h.tracker.add_card("L1", card("C4", "New work"));

    let (_, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(report.imported_count, 1);
    assert_eq!(report.updated_count, 2);

    let c1 = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(c1.description.as_deref(), Some("root cause found"));
}

#[tokio::test]
async fn renamed_card_updates_same_task() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let before = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C1")
        .await
        .unwrap()
        .unwrap();

    h.tracker.edit_card("C1", |c| c.name = "Fix the bug properly".into());
    let report = h
        .engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap();
    assert_eq!(report.imported_count, 0);
    assert_eq!(report.updated_count, 2);

    let after = h.db.get_task(&before.id).await.unwrap();
    assert_eq!(after.title, "Fix the bug properly");
    assert_eq!(h.engine.list_project_tasks(&project.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn archiving_upstream_completes_task() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();

    h.tracker.edit_card("C1", |c| c.closed = true);
    h.engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap();

    let task = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.status, Status::Completed);
    let meta = h.db.get_task_meta(&task.id).await.unwrap().unwrap();
    assert_eq!(meta.remote_state, RemoteState::Archived);
}

#[tokio::test]
async fn import_sets_default_list_to_first_open_list() {
    let tracker = MockTracker::new()
        .with_board("B1", "Roadmap")
        .with_list("B1", "L0", "Archive", true)
        .with_list("B1", "L1", "Todo", false)
        .with_list("B1", "L2", "Doing", false);
    let h = harness(tracker);
    let (project, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(project.remote_default_list_id.as_deref(), Some("L1"));
    assert_eq!(report.processed_count(), 0);
}

#[tokio::test]
async fn empty_board_is_success_with_message() {
    let h = harness(MockTracker::new().with_board("B1", "Empty"));
    let (project, report) = h
        .engine
        .import_board(&cred(), "B1", "Empty", OWNER)
        .await
        .unwrap();
    assert_eq!(report.imported_count, 0);
    assert!(report.message.is_some());
    assert_eq!(project.name, "Empty");
}

#[tokio::test]
async fn list_fetch_failure_on_import_is_reported_not_raised() {
    let tracker = scenario_tracker();
    tracker.fail(Operation::FetchLists, Failure::Remote(503));
    let h = harness(tracker);
    let (_, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(report.imported_count, 0);
    assert!(report.message.unwrap().contains("could not fetch lists"));
}

#[tokio::test]
async fn list_fetch_failure_on_sync_is_an_error() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    h.tracker.fail(Operation::FetchLists, Failure::Transport);
    let err = h
        .engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn failing_list_does_not_stop_siblings() {
    let tracker = MockTracker::new()
        .with_board("B1", "Roadmap")
        .with_list("B1", "L1", "Todo", false)
        .with_list("B1", "L2", "Doing", false)
        .with_card("L1", card("C1", "One"))
        .with_card("L2", card("C2", "Two"));
    tracker.fail_for(Operation::FetchCards, "L1", Failure::Transport);
    let h = harness(tracker);

    let (project, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(report.imported_count, 1);
    assert_eq!(report.failed_lists.len(), 1);
    assert_eq!(report.failed_lists[0].list_id, "L1");
    assert_eq!(report.outcomes[0].card_id, "C2");
    assert_eq!(report.outcomes[0].action, CardAction::Created);
    assert_eq!(h.engine.list_project_tasks(&project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn passed_deadline_skips_remaining_lists() {
    let config = SyncConfig {
        deadline: Some(Duration::ZERO),
    };
    let h = harness_with(scenario_tracker(), config);
    let (_, report) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(report.skipped_lists, vec!["L1".to_string()]);
    assert_eq!(report.imported_count, 0);
    assert!(report.message.is_some());
    assert_eq!(h.tracker.count(Operation::FetchCards), 0);
}

#[tokio::test]
async fn concurrent_imports_do_not_duplicate() {
    let h = harness(scenario_tracker());
    let cred = cred();
    let (a, b) = tokio::join!(
        h.engine.import_board(&cred, "B1", "Roadmap", OWNER),
        h.engine.import_board(&cred, "B1", "Roadmap", OWNER),
    );
    let (project, first) = a.unwrap();
    let (_, second) = b.unwrap();
    assert_eq!(first.imported_count + second.imported_count, 2);
    assert_eq!(h.engine.list_project_tasks(&project.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn sync_preconditions_are_checked_in_order() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let local_only = h
        .db
        .create_project(&CreateProject {
            owner_id: OWNER.into(),
            name: "Local".into(),
            description: String::new(),
            source: TaskSource::None,
            remote_board_id: None,
            remote_default_list_id: None,
        })
        .await
        .unwrap();
    let calls_before = h.tracker.calls().len();

    let err = h
        .engine
        .sync_project(None, "someone-else", &local_only.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)), "{err:?}");

    let err = h
        .engine
        .sync_project(Some(&cred()), "someone-else", &project.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Forbidden(_)), "{err:?}");

    let err = h
        .engine
        .sync_project(Some(&cred()), OWNER, &local_only.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)), "{err:?}");

    assert_eq!(h.tracker.calls().len(), calls_before);
}

#[tokio::test]
async fn rejected_token_fails_sync_as_auth() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    h.tracker.fail(Operation::FetchLists, Failure::Auth);
    let err = h
        .engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn failed_push_leaves_local_task_unchanged() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let task = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C1")
        .await
        .unwrap()
        .unwrap();
    let meta_before = h.db.get_task_meta(&task.id).await.unwrap();

    h.tracker.fail(Operation::UpdateCard, Failure::Remote(500));
    let outcome = h
        .engine
        .push_task(Some(&cred()), &task.id, PushAction::Update)
        .await;

    assert!(!outcome.succeeded());
    assert!(matches!(outcome, PushOutcome::Failed(SyncError::Remote(_))));
    assert_eq!(h.db.get_task(&task.id).await.unwrap(), task);
    assert_eq!(h.db.get_task_meta(&task.id).await.unwrap(), meta_before);
}

#[tokio::test]
async fn push_update_and_archive_mirror_remote_state() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let task = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C1")
        .await
        .unwrap()
        .unwrap();

    h.db
        .update_task(
            &task.id,
            &boardsync_core::task::UpdateTask {
                status: Some(Status::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let outcome = h
        .engine
        .push_task(Some(&cred()), &task.id, PushAction::Update)
        .await;
    assert!(outcome.succeeded(), "{outcome:?}");
    assert!(h.tracker.card("C1").unwrap().closed);
    let meta = h.db.get_task_meta(&task.id).await.unwrap().unwrap();
    assert_eq!(meta.remote_state, RemoteState::Archived);

    let outcome = h
        .engine
        .push_task(Some(&cred()), &task.id, PushAction::Archive)
        .await;
    assert!(outcome.succeeded());
}

#[tokio::test]
async fn pushed_card_lands_in_default_list_and_is_not_reimported() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let task = h
        .db
        .create_task(&boardsync_core::task::CreateTask {
            project_id: project.id.clone(),
            title: "Written locally".into(),
            description: Some("from the app".into()),
            due_date: None,
            status: Status::Pending,
            priority: Priority::Low,
            is_imported: false,
        })
        .await
        .unwrap();

    let outcome = h
        .engine
        .push_task(Some(&cred()), &task.id, PushAction::Create)
        .await;
    assert!(outcome.succeeded(), "{outcome:?}");

    let meta = h.db.get_task_meta(&task.id).await.unwrap().unwrap();
    let card_id = meta.remote_card_id.clone().unwrap();
    let card = h.tracker.card(&card_id).unwrap();
    assert_eq!(card.id_list.as_deref(), Some("L1"));
    assert_eq!(card.labels[0].name, "Low Priority");

    let report = h
        .engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap();
    assert_eq!(report.imported_count, 0);
    assert_eq!(h.engine.list_project_tasks(&project.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn push_delete_removes_card_only() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    let task = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C2")
        .await
        .unwrap()
        .unwrap();

    let outcome = h
        .engine
        .push_task(Some(&cred()), &task.id, PushAction::Delete)
        .await;
    assert!(outcome.succeeded());
    assert!(h.tracker.card("C2").is_none());
    assert!(h.db.get_task(&task.id).await.is_ok());
}

#[tokio::test]
async fn failing_card_does_not_stop_siblings() {
    let tracker = Arc::new(
        MockTracker::new()
            .with_board("B1", "Roadmap")
            .with_list("B1", "L1", "Todo", false)
            .with_card("L1", card("C1", "Breaks"))
            .with_card("L1", card("C2", "Fine")),
    );
    let db: Arc<dyn Database> = Arc::new(common::FailingStore::new("C1"));
    let engine = SyncEngine::new(db.clone(), tracker, SyncConfig::default());

    let (project, report) = engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();

    assert_eq!(report.imported_count, 1);
    assert_eq!(report.updated_count, 0);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].card_id, "C1");
    assert!(matches!(report.outcomes[0].action, CardAction::Failed(_)));
    assert_eq!(report.outcomes[1].card_id, "C2");
    assert_eq!(report.outcomes[1].action, CardAction::Created);

    let linked = engine.list_project_tasks(&project.id).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].task.title, "Fine");
}

#[tokio::test]
async fn relinking_name_to_new_board_moves_push_target() {
    let tracker = MockTracker::new()
        .with_board("B0", "Old board")
        .with_list("B0", "L0", "Todo", false)
        .with_board("B1", "New board")
        .with_list("B1", "L1", "Todo", false);
    let h = harness(tracker);
    let (old, _) = h
        .engine
        .import_board(&cred(), "B0", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(old.remote_default_list_id.as_deref(), Some("L0"));

    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(project.id, old.id);
    assert_eq!(project.remote_board_id.as_deref(), Some("B1"));
    assert_eq!(project.remote_default_list_id.as_deref(), Some("L1"));

    let task = h
        .db
        .create_task(&boardsync_core::task::CreateTask {
            project_id: project.id.clone(),
            title: "After move".into(),
            description: None,
            due_date: None,
            status: Status::Pending,
            priority: Priority::High,
            is_imported: false,
        })
        .await
        .unwrap();
    let outcome = h
        .engine
        .push_task(Some(&cred()), &task.id, PushAction::Create)
        .await;
    assert!(outcome.succeeded(), "{outcome:?}");

    let meta = h.db.get_task_meta(&task.id).await.unwrap().unwrap();
    let card = h.tracker.card(meta.remote_card_id.as_deref().unwrap()).unwrap();
    assert_eq!(card.id_list.as_deref(), Some("L1"));
    assert_eq!(card.labels.len(), 1);
    assert_eq!(card.labels[0].name, "High Priority");
}

#[tokio::test]
async fn archived_default_list_is_replaced_on_sync() {
    let tracker = MockTracker::new()
        .with_board("B1", "Roadmap")
        .with_list("B1", "L1", "Todo", false)
        .with_list("B1", "L2", "Doing", false);
    let h = harness(tracker);
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();
    assert_eq!(project.remote_default_list_id.as_deref(), Some("L1"));

    h.db
        .update_project(
            &project.id,
            &boardsync_core::project::UpdateProject {
                remote_default_list_id: Some(Some("L-gone".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap();

    let project = h.db.get_project(&project.id).await.unwrap();
    assert_eq!(project.remote_default_list_id.as_deref(), Some("L1"));
}

#[tokio::test]
async fn card_losing_its_url_clears_stored_url() {
    let h = harness(scenario_tracker());
    let (project, _) = h
        .engine
        .import_board(&cred(), "B1", "Roadmap", OWNER)
        .await
        .unwrap();

    h.tracker.edit_card("C1", |c| c.short_url = None);
    h.engine
        .sync_project(Some(&cred()), OWNER, &project.id)
        .await
        .unwrap();

    let task = h
        .db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "C1")
        .await
        .unwrap()
        .unwrap();
    let meta = h.db.get_task_meta(&task.id).await.unwrap().unwrap();
    assert_eq!(meta.remote_url, None);
}
