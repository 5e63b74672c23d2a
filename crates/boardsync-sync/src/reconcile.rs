//! Per-card reconciliation in both directions.
//!
//! Pull: a remote card becomes a new local task or refreshes the task
//! already linked to it. Push: a local task's fields are written to its
//! card. Push calls never return an error; failures come back as
//! [`PushOutcome::Failed`].

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use boardsync_core::project::{Project, TaskSource};
use boardsync_core::remote::{RemoteCard, RemoteCredential, RemoteList};
use boardsync_core::task::{CreateTask, Status, Task, UpdateTask};
use boardsync_core::task_meta::{MetaFields, RemoteState, TaskMeta};
use boardsync_db::Database;
use boardsync_trello::{CardFields, RemoteTracker};

use crate::labels::{labels_for_priority, priority_from_labels};
use crate::report::{CardAction, PushOutcome};
use crate::SyncError;

/// Which push to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    Create,
    Update,
    Archive,
    Delete,
}

impl PushAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushAction::Create => "create",
            PushAction::Update => "update",
            PushAction::Archive => "archive",
            PushAction::Delete => "delete",
        }
    }
}

pub struct Reconciler {
    db: Arc<dyn Database>,
    tracker: Arc<dyn RemoteTracker>,
}

impl Reconciler {
    pub fn new(db: Arc<dyn Database>, tracker: Arc<dyn RemoteTracker>) -> Self {
        Self { db, tracker }
    }

    /// Create or refresh the local task for `card`. The card id is the
    /// matching key; nothing else about the card identifies the task.
    pub async fn pull_card(
        &self,
        project_id: &str,
        list: &RemoteList,
        card: &RemoteCard,
    ) -> Result<CardAction, SyncError> {
        let meta = MetaFields::for_card(
            &card.id,
            card.closed,
            card.short_url.as_deref(),
            &list.id,
            &list.name,
        );
        let existing = self
            .db
            .find_task_by_remote_id(project_id, TaskSource::Trello, &card.id)
            .await?;

        match existing {
            None => {
                let input = CreateTask {
                    project_id: project_id.to_string(),
                    title: card.name.clone(),
                    description: card.description(),
                    due_date: card.due_date(),
                    status: Status::from_closed(card.closed),
                    priority: priority_from_labels(&card.labels),
                    is_imported: true,
                };
                let linked = self.db.create_task_with_meta(&input, &meta).await?;
                debug!(task_id = %linked.task.id, card_id = %card.id, "created task from card");
                Ok(CardAction::Created)
            }
            Some(task) => {
                let update = UpdateTask {
                    title: Some(card.name.clone()),
                    description: Some(card.description()),
                    due_date: Some(card.due_date()),
                    status: Some(Status::from_closed(card.closed)),
                    priority: Some(priority_from_labels(&card.labels)),
                    is_imported: Some(true),
                };
                self.db.update_task_with_meta(&task.id, &update, &meta).await?;
                debug!(task_id = %task.id, card_id = %card.id, "refreshed task from card");
                Ok(CardAction::Updated)
            }
        }
    }

    /// Run `action` for `task_id`, logging any failure with task context.
    pub async fn push(
        &self,
        cred: Option<&RemoteCredential>,
        task_id: &str,
        action: PushAction,
    ) -> PushOutcome {
        let result = match action {
            PushAction::Create => self.push_create(cred, task_id).await,
            PushAction::Update => self.push_update(cred, task_id).await,
            PushAction::Archive => self.push_archive(cred, task_id).await,
            PushAction::Delete => self.push_delete(cred, task_id).await,
        };
        match result {
            Ok(()) => {
                info!(task_id, action = action.as_str(), "pushed task to tracker");
                PushOutcome::Succeeded
            }
            Err(e) => {
                warn!(task_id, action = action.as_str(), error = %e, "push to tracker failed");
                PushOutcome::Failed(e)
            }
        }
    }

    async fn push_create(
        &self,
        cred: Option<&RemoteCredential>,
        task_id: &str,
    ) -> Result<(), SyncError> {
        let cred = require_credential(cred)?;
        let task = self.db.get_task(task_id).await?;
        let project = self.db.get_project(&task.project_id).await?;
        let (board_id, list_id) = push_target(&project)?;
        if let Some(meta) = self.db.get_task_meta(task_id).await? {
            if meta.is_linked() {
                return Err(SyncError::Validation(format!(
                    "task {task_id} is already linked to a card"
                )));
            }
        }

        let labels =
            labels_for_priority(self.tracker.as_ref(), cred, board_id, task.priority).await;
        let fields = CardFields {
            name: Some(task.title.clone()),
            desc: task.description.clone(),
            due: task.due_date,
            ..Default::default()
        }
        .with_labels(&labels);

        let card = self.tracker.create_card(cred, list_id, &fields).await?;
        let update = UpdateTask {
            is_imported: Some(true),
            ..Default::default()
        };
        let meta = MetaFields {
            source: Some(TaskSource::Trello),
            remote_card_id: Some(card.id.clone()),
            remote_state: Some(RemoteState::from_closed(card.closed)),
            remote_url: Some(card.short_url.clone()),
            extra: Some(json!({ "list_id": card.id_list.as_deref().unwrap_or(list_id) })),
        };
        self.db.update_task_with_meta(task_id, &update, &meta).await?;
        Ok(())
    }

    async fn push_update(
        &self,
        cred: Option<&RemoteCredential>,
        task_id: &str,
    ) -> Result<(), SyncError> {
        let (task, card_id) = self.linked_task(task_id).await?;
        let cred = require_credential(cred)?;
        let fields = CardFields {
            name: Some(task.title.clone()),
            desc: Some(task.description.clone().unwrap_or_default()),
            due: task.due_date,
            closed: Some(task.status == Status::Completed),
            ..Default::default()
        };
        let card = self.tracker.update_card(cred, &card_id, &fields).await?;
        self.record_remote_state(task_id, &card).await
    }

    async fn push_archive(
        &self,
        cred: Option<&RemoteCredential>,
        task_id: &str,
    ) -> Result<(), SyncError> {
        let (_, card_id) = self.linked_task(task_id).await?;
        let cred = require_credential(cred)?;
        let fields = CardFields {
            closed: Some(true),
            ..Default::default()
        };
        self.tracker.update_card(cred, &card_id, &fields).await?;
        self.db
            .upsert_meta(
                task_id,
                &MetaFields {
                    remote_state: Some(RemoteState::Archived),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Deletes the card only; the local task and its meta row are left to
    /// the caller.
    async fn push_delete(
        &self,
        cred: Option<&RemoteCredential>,
        task_id: &str,
    ) -> Result<(), SyncError> {
        let (_, card_id) = self.linked_task(task_id).await?;
        let cred = require_credential(cred)?;
        self.tracker.delete_card(cred, &card_id).await?;
        Ok(())
    }

    /// Load a task and its card id, failing before any remote call when
    /// the task has no linkage.
    async fn linked_task(&self, task_id: &str) -> Result<(Task, String), SyncError> {
        let task = self.db.get_task(task_id).await?;
        let card_id = self
            .db
            .get_task_meta(task_id)
            .await?
            .filter(TaskMeta::is_linked)
            .and_then(|meta| meta.remote_card_id)
            .ok_or_else(|| {
                SyncError::Validation(format!("task {task_id} is not linked to a card"))
            })?;
        Ok((task, card_id))
    }

    async fn record_remote_state(&self, task_id: &str, card: &RemoteCard) -> Result<(), SyncError> {
        let fields = MetaFields {
            remote_state: Some(RemoteState::from_closed(card.closed)),
            remote_url: Some(card.short_url.clone()),
            ..Default::default()
        };
        self.db.upsert_meta(task_id, &fields).await?;
        Ok(())
    }
}

pub(crate) fn require_credential(
    cred: Option<&RemoteCredential>,
) -> Result<&RemoteCredential, SyncError> {
    cred.filter(|c| c.is_complete())
        .ok_or_else(|| SyncError::Auth("no tracker credential for this account".into()))
}

fn push_target(project: &Project) -> Result<(&str, &str), SyncError> {
    project.remote_linkage().ok_or_else(|| {
        SyncError::Validation(format!(
            "project {} has no board and default list to push to",
            project.id
        ))
    })
}
