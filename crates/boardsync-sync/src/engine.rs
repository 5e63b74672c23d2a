use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use boardsync_core::project::{CreateProject, Project, TaskSource, UpdateProject};
use boardsync_core::remote::{RemoteBoard, RemoteCredential, RemoteList};
use boardsync_db::{Database, LinkedTask};
use boardsync_trello::RemoteTracker;

use crate::reconcile::{require_credential, PushAction, Reconciler};
use crate::{
    CardAction, ListFailure, ProjectLocks, PushOutcome, SyncConfig, SyncError, SyncReport,
};

/// Stops new remote calls once passed.
struct Deadline(Option<Instant>);

impl Deadline {
    fn start(config: &SyncConfig) -> Self {
        Self(config.deadline.map(|d| Instant::now() + d))
    }

    fn passed(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

pub struct SyncEngine {
    db: Arc<dyn Database>,
    tracker: Arc<dyn RemoteTracker>,
    reconciler: Reconciler,
    locks: ProjectLocks,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(db: Arc<dyn Database>, tracker: Arc<dyn RemoteTracker>, config: SyncConfig) -> Self {
        let reconciler = Reconciler::new(db.clone(), tracker.clone());
        Self {
            db,
            tracker,
            reconciler,
            locks: ProjectLocks::new(),
            config,
        }
    }

    pub async fn list_boards(&self, cred: &RemoteCredential) -> Result<Vec<RemoteBoard>, SyncError> {
        let cred = require_credential(Some(cred))?;
        Ok(self.tracker.fetch_boards(cred).await?)
    }

    /// Import `board_id` as the owner's project named `board_name`.
    ///
    /// Re-importing targets the same project and refreshes tasks already
    /// linked to cards. A board whose lists cannot be fetched, or that has
    /// none, is reported with a message rather than as an error.
    pub async fn import_board(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
        board_name: &str,
        owner_id: &str,
    ) -> Result<(Project, SyncReport), SyncError> {
        let cred = require_credential(Some(cred))?;
        let project = self
            .db
            .upsert_project(&CreateProject {
                owner_id: owner_id.to_string(),
                name: board_name.to_string(),
                description: format!("Imported from board {board_id}"),
                source: TaskSource::Trello,
                remote_board_id: Some(board_id.to_string()),
                remote_default_list_id: None,
            })
            .await?;
        let _guard = self.locks.acquire(&project.id).await;
        let deadline = Deadline::start(&self.config);

        let lists = match self.tracker.fetch_lists(cred, board_id).await {
            Ok(lists) => lists,
            Err(e) => {
                warn!(project_id = %project.id, board_id, error = %e, "could not fetch lists");
                let report = SyncReport::with_message(format!("could not fetch lists: {e}"));
                return Ok((project, report));
            }
        };
        if lists.is_empty() {
            info!(project_id = %project.id, board_id, "board has no lists");
            return Ok((project, SyncReport::with_message("board has no lists")));
        }

        let project = self.ensure_default_list(project, &lists).await?;
        let report = self.walk(cred, &project, &lists, &deadline).await;
        info!(
            project_id = %project.id,
            board_id,
            imported = report.imported_count,
            updated = report.updated_count,
            failed = report.failed_count(),
            "board import finished"
        );
        Ok((project, report))
    }

    /// Re-walk the board behind `project_id` for `caller_id`.
    ///
    /// Preconditions are checked in order with no side effects: credential,
    /// ownership, then remote source.
    pub async fn sync_project(
        &self,
        cred: Option<&RemoteCredential>,
        caller_id: &str,
        project_id: &str,
    ) -> Result<SyncReport, SyncError> {
        let cred = require_credential(cred)?;
        let project = self.db.get_project(project_id).await?;
        if project.owner_id != caller_id {
            return Err(SyncError::Forbidden(format!(
                "project {project_id} is not owned by {caller_id}"
            )));
        }
        let board_id = match (&project.remote_board_id, project.source.is_remote()) {
            (Some(board), true) => board.clone(),
            _ => {
                return Err(SyncError::Validation(format!(
                    "project {project_id} is not linked to a board"
                )))
            }
        };

        let _guard = self.locks.acquire(&project.id).await;
        let deadline = Deadline::start(&self.config);
        let lists = self.tracker.fetch_lists(cred, &board_id).await?;
        let project = self.ensure_default_list(project, &lists).await?;
        let report = self.walk(cred, &project, &lists, &deadline).await;
        info!(
            project_id = %project.id,
            board_id = %board_id,
            imported = report.imported_count,
            updated = report.updated_count,
            failed = report.failed_count(),
            "project sync finished"
        );
        Ok(report)
    }

    pub async fn list_project_tasks(&self, project_id: &str) -> Result<Vec<LinkedTask>, SyncError> {
        Ok(self.db.list_linked_tasks(project_id).await?)
    }

    pub async fn push_task(
        &self,
        cred: Option<&RemoteCredential>,
        task_id: &str,
        action: PushAction,
    ) -> PushOutcome {
        let project_id = match self.db.get_task(task_id).await {
            Ok(task) => task.project_id,
            Err(e) => {
                warn!(task_id, action = action.as_str(), error = %e, "push to tracker failed");
                return PushOutcome::Failed(e.into());
            }
        };
        let _guard = self.locks.acquire(&project_id).await;
        self.reconciler.push(cred, task_id, action).await
    }

    /// Walk open lists in order, reconciling every card. Card and list
    /// failures are recorded and the walk continues.
    async fn walk(
        &self,
        cred: &RemoteCredential,
        project: &Project,
        lists: &[RemoteList],
        deadline: &Deadline,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        for list in lists {
            if list.closed {
                debug!(list_id = %list.id, "skipping closed list");
                continue;
            }
            if deadline.passed() {
                report.skipped_lists.push(list.id.clone());
                continue;
            }

            let cards = match self.tracker.fetch_cards(cred, &list.id).await {
                Ok(cards) => cards,
                Err(e) => {
                    warn!(project_id = %project.id, list_id = %list.id, error = %e, "could not fetch cards");
                    report.failed_lists.push(ListFailure {
                        list_id: list.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for card in &cards {
                let action = match self.reconciler.pull_card(&project.id, list, card).await {
                    Ok(action) => action,
                    Err(e) => {
                        warn!(
                            project_id = %project.id,
                            list_id = %list.id,
                            card_id = %card.id,
                            error = %e,
                            "card reconcile failed"
                        );
                        CardAction::Failed(e.to_string())
                    }
                };
                report.record(&card.id, &list.id, action);
            }
        }

        if !report.skipped_lists.is_empty() {
            report.message = Some(format!(
                "deadline passed, {} list(s) not walked",
                report.skipped_lists.len()
            ));
        }
        report
    }

    /// Point the project's push target at the first open list when it is
    /// unset or no longer an open list of the board.
    async fn ensure_default_list(
        &self,
        project: Project,
        lists: &[RemoteList],
    ) -> Result<Project, SyncError> {
        let current = project.remote_default_list_id.as_deref();
        if lists.iter().any(|l| !l.closed && Some(l.id.as_str()) == current) {
            return Ok(project);
        }
        let next = lists.iter().find(|l| !l.closed).map(|l| l.id.clone());
        if next.is_none() && current.is_none() {
            return Ok(project);
        }
        if let Some(stale) = current {
            info!(project_id = %project.id, list_id = stale, "default list is not on the board, replacing");
        }
        let update = UpdateProject {
            remote_default_list_id: Some(next),
            ..Default::default()
        };
        Ok(self.db.update_project(&project.id, &update).await?)
    }
}
