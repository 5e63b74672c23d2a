//! Local persistence for projects, tasks and their remote linkage.
//!
//! The sync engine only talks to storage through [`Database`], so the
//! backend can be swapped. [`SqliteDatabase`] is the bundled backend.

pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use boardsync_core::project::{CreateProject, Project, TaskSource, UpdateProject};
use boardsync_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use boardsync_core::task_meta::{MetaFields, TaskMeta};

pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Path to the SQLite file. Defaults to `<data dir>/boardsync.db`.
    pub sqlite_path: Option<String>,
}

/// A task together with its linkage row, if any.
#[derive(Debug, Clone)]
pub struct LinkedTask {
    pub task: Task,
    pub meta: Option<TaskMeta>,
}

#[async_trait]
pub trait Database: Send + Sync {
    // -- Projects --
    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError>;
    async fn get_project(&self, id: &str) -> Result<Project, DbError>;
    async fn find_project_by_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<Project>, DbError>;
    async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, DbError>;
    async fn update_project(&self, id: &str, update: &UpdateProject) -> Result<Project, DbError>;
    /// Insert or update keyed by `(owner_id, name)`, atomically.
    async fn upsert_project(&self, input: &CreateProject) -> Result<Project, DbError>;
    async fn delete_project(&self, id: &str) -> Result<(), DbError>;

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError>;
    async fn get_task(&self, id: &str) -> Result<Task, DbError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError>;
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError>;
    async fn delete_task(&self, id: &str) -> Result<(), DbError>;

    // -- Task meta --
    async fn get_task_meta(&self, task_id: &str) -> Result<Option<TaskMeta>, DbError>;
    async fn find_task_by_remote_id(
        &self,
        project_id: &str,
        source: TaskSource,
        remote_card_id: &str,
    ) -> Result<Option<Task>, DbError>;
    async fn upsert_meta(&self, task_id: &str, fields: &MetaFields) -> Result<TaskMeta, DbError>;
    /// Create a task and its meta row in one transaction.
    async fn create_task_with_meta(
        &self,
        task: &CreateTask,
        meta: &MetaFields,
    ) -> Result<LinkedTask, DbError>;
    /// Update a task and its meta row in one transaction.
    async fn update_task_with_meta(
        &self,
        task_id: &str,
        update: &UpdateTask,
        meta: &MetaFields,
    ) -> Result<LinkedTask, DbError>;
    async fn list_linked_tasks(&self, project_id: &str) -> Result<Vec<LinkedTask>, DbError>;
}

pub(crate) fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("boardsync")
}

/// Open the backend selected by `config`.
pub fn open_database(config: &DbConfig) -> Result<std::sync::Arc<dyn Database>, DbError> {
    Ok(std::sync::Arc::new(SqliteDatabase::open(config)?))
}
