pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode};

use boardsync_core::project::{CreateProject, Project, TaskSource, UpdateProject};
use boardsync_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use boardsync_core::task_meta::{MetaFields, TaskMeta};

use crate::{Database, DbConfig, DbError, LinkedTask};

/// Converts `rusqlite::Result<T>` into `Result<T, DbError>` via `.to_db()?`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("boardsync.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }
}

/// Constraint violations become `Conflict`; everything else is `Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            DbError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => DbError::Internal(e.to_string()),
    }
}

/// Like `map_sqlite_err`, but an empty result becomes `NotFound(what)`.
pub(crate) fn not_found_or(what: impl FnOnce() -> String) -> impl FnOnce(rusqlite::Error) -> DbError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what()),
        other => map_sqlite_err(other),
    }
}

fn join_err(e: tokio::task::JoinError) -> DbError {
    DbError::Internal(e.to_string())
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Projects --
    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        let db = self.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || db.create_project_sync(&input))
            .await
            .map_err(join_err)?
    }
    async fn get_project(&self, id: &str) -> Result<Project, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.get_project_sync(&id))
            .await
            .map_err(join_err)?
    }
    async fn find_project_by_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<Project>, DbError> {
        let db = self.clone();
        let owner_id = owner_id.to_string();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || db.find_project_by_name_sync(&owner_id, &name))
            .await
            .map_err(join_err)?
    }
    async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, DbError> {
        let db = self.clone();
        let owner_id = owner_id.to_string();
        tokio::task::spawn_blocking(move || db.list_projects_sync(&owner_id))
            .await
            .map_err(join_err)?
    }
    async fn update_project(&self, id: &str, update: &UpdateProject) -> Result<Project, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let update = update.clone();
        tokio::task::spawn_blocking(move || db.update_project_sync(&id, &update))
            .await
            .map_err(join_err)?
    }
    async fn upsert_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        let db = self.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || db.upsert_project_sync(&input))
            .await
            .map_err(join_err)?
    }
    async fn delete_project(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_project_sync(&id))
            .await
            .map_err(join_err)?
    }

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let db = self.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || db.create_task_sync(&input))
            .await
            .map_err(join_err)?
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.get_task_sync(&id))
            .await
            .map_err(join_err)?
    }
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        let db = self.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || db.list_tasks_sync(&filter))
            .await
            .map_err(join_err)?
    }
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let update = update.clone();
        tokio::task::spawn_blocking(move || db.update_task_sync(&id, &update))
            .await
            .map_err(join_err)?
    }
    async fn delete_task(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_task_sync(&id))
            .await
            .map_err(join_err)?
    }

    // -- Task meta --
    async fn get_task_meta(&self, task_id: &str) -> Result<Option<TaskMeta>, DbError> {
        let db = self.clone();
        let task_id = task_id.to_string();
        tokio::task::spawn_blocking(move || db.get_task_meta_sync(&task_id))
            .await
            .map_err(join_err)?
    }
    async fn find_task_by_remote_id(
        &self,
        project_id: &str,
        source: TaskSource,
        remote_card_id: &str,
    ) -> Result<Option<Task>, DbError> {
        let db = self.clone();
        let project_id = project_id.to_string();
        let remote_card_id = remote_card_id.to_string();
        tokio::task::spawn_blocking(move || {
            db.find_task_by_remote_id_sync(&project_id, source, &remote_card_id)
        })
        .await
        .map_err(join_err)?
    }
    async fn upsert_meta(&self, task_id: &str, fields: &MetaFields) -> Result<TaskMeta, DbError> {
        let db = self.clone();
        let task_id = task_id.to_string();
        let fields = fields.clone();
        tokio::task::spawn_blocking(move || db.upsert_meta_sync(&task_id, &fields))
            .await
            .map_err(join_err)?
    }
    async fn create_task_with_meta(
        &self,
        task: &CreateTask,
        meta: &MetaFields,
    ) -> Result<LinkedTask, DbError> {
        let db = self.clone();
        let task = task.clone();
        let meta = meta.clone();
        tokio::task::spawn_blocking(move || db.create_task_with_meta_sync(&task, &meta))
            .await
            .map_err(join_err)?
    }
    async fn update_task_with_meta(
        &self,
        task_id: &str,
        update: &UpdateTask,
        meta: &MetaFields,
    ) -> Result<LinkedTask, DbError> {
        let db = self.clone();
        let task_id = task_id.to_string();
        let update = update.clone();
        let meta = meta.clone();
        tokio::task::spawn_blocking(move || {
            db.update_task_with_meta_sync(&task_id, &update, &meta)
        })
        .await
        .map_err(join_err)?
    }
    async fn list_linked_tasks(&self, project_id: &str) -> Result<Vec<LinkedTask>, DbError> {
        let db = self.clone();
        let project_id = project_id.to_string();
        tokio::task::spawn_blocking(move || db.list_linked_tasks_sync(&project_id))
            .await
            .map_err(join_err)?
    }
}
