// Backend-agnostic tests for the Database trait.
//
// Each function takes `&dyn Database` so any backend can reuse them.

use boardsync_core::project::{CreateProject, TaskSource, UpdateProject};
use boardsync_core::task::{CreateTask, Priority, Status, TaskFilter, UpdateTask};
use boardsync_core::task_meta::{MetaFields, RemoteState};
use boardsync_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn board_project(owner: &str, name: &str, board: &str) -> CreateProject {
    CreateProject {
        owner_id: owner.to_string(),
        name: name.to_string(),
        description: String::new(),
        source: TaskSource::Trello,
        remote_board_id: Some(board.to_string()),
        remote_default_list_id: None,
    }
}

fn make_task(project_id: &str, title: &str) -> CreateTask {
    CreateTask {
        project_id: project_id.to_string(),
        title: title.to_string(),
        description: None,
        due_date: None,
        status: Status::Pending,
        priority: Priority::Medium,
        is_imported: false,
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub async fn test_project_upsert(db: &dyn Database) {
    let first = db.upsert_project(&board_project("u1", "Roadmap", "b1")).await.unwrap();
    let again = db.upsert_project(&board_project("u1", "Roadmap", "b1")).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.source, TaskSource::Trello);
    assert_eq!(again.remote_board_id.as_deref(), Some("b1"));

    let found = db.find_project_by_name("u1", "Roadmap").await.unwrap();
    assert_eq!(found.map(|p| p.id), Some(first.id.clone()));

    let updated = db
        .update_project(
            &first.id,
            &UpdateProject {
                remote_default_list_id: Some(Some("l9".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.remote_linkage(), Some(("b1", "l9")));

    db.delete_project(&first.id).await.unwrap();
    assert!(db.list_projects("u1").await.unwrap().is_empty());
}

pub async fn test_projects_scoped_by_owner(db: &dyn Database) {
    db.upsert_project(&board_project("u1", "Shared", "b1")).await.unwrap();
    db.upsert_project(&board_project("u2", "Shared", "b1")).await.unwrap();
    assert_eq!(db.list_projects("u1").await.unwrap().len(), 1);
    assert_eq!(db.list_projects("u2").await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Tasks and meta
// ---------------------------------------------------------------------------

pub async fn test_task_lifecycle(db: &dyn Database) {
    let project = db.upsert_project(&board_project("u1", "P", "b1")).await.unwrap();
    let task = db.create_task(&make_task(&project.id, "plain")).await.unwrap();
    assert!(db.get_task_meta(&task.id).await.unwrap().is_none());

    let task = db
        .update_task(
            &task.id,
            &UpdateTask {
                priority: Some(Priority::Low),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(task.priority, Priority::Low);

    let listed = db
        .list_tasks(&TaskFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    db.delete_task(&task.id).await.unwrap();
    assert!(matches!(
        db.get_task(&task.id).await,
        Err(DbError::NotFound(_))
    ));
}

pub async fn test_meta_linkage(db: &dyn Database) {
    let project = db.upsert_project(&board_project("u1", "P", "b1")).await.unwrap();
    let mut input = make_task(&project.id, "Fix bug");
    input.is_imported = true;
    let linked = db
        .create_task_with_meta(
            &input,
            &MetaFields::for_card("c1", false, Some("https://trello.com/c/1"), "l1", "Todo"),
        )
        .await
        .unwrap();

    let found = db
        .find_task_by_remote_id(&project.id, TaskSource::Trello, "c1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, linked.task.id);

    // card ids are scoped to their project
    let other = db.upsert_project(&board_project("u1", "Q", "b2")).await.unwrap();
    assert!(db
        .find_task_by_remote_id(&other.id, TaskSource::Trello, "c1")
        .await
        .unwrap()
        .is_none());

    let meta = db
        .upsert_meta(
            &linked.task.id,
            &MetaFields {
                remote_state: Some(RemoteState::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(meta.remote_state, RemoteState::Archived);

    let all = db.list_linked_tasks(&project.id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].meta.as_ref().is_some_and(|m| m.is_linked()));
}

pub async fn test_meta_on_plain_task(db: &dyn Database) {
    let project = db.upsert_project(&board_project("u1", "P", "b1")).await.unwrap();
    let task = db.create_task(&make_task(&project.id, "local")).await.unwrap();
    let meta = db
        .upsert_meta(&task.id, &MetaFields::for_card("c7", false, None, "l1", "Todo"))
        .await
        .unwrap();
    assert_eq!(meta.remote_card_id.as_deref(), Some("c7"));
    assert!(matches!(
        db.upsert_meta("missing", &MetaFields::default()).await,
        Err(DbError::NotFound(_))
    ));
}
