// Store wrapper that fails task creation for chosen cards.

use async_trait::async_trait;

use boardsync_core::project::{CreateProject, Project, TaskSource, UpdateProject};
use boardsync_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use boardsync_core::task_meta::{MetaFields, TaskMeta};
use boardsync_db::{Database, DbError, LinkedTask, SqliteDatabase};

pub struct FailingStore {
    inner: SqliteDatabase,
    fail_card: String,
}

impl FailingStore {
    pub fn new(fail_card: &str) -> Self {
        Self {
            inner: SqliteDatabase::open_in_memory().unwrap(),
            fail_card: fail_card.to_string(),
        }
    }
}

#[async_trait]
impl Database for FailingStore {
    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        self.inner.create_project(input).await
    }
    async fn get_project(&self, id: &str) -> Result<Project, DbError> {
        self.inner.get_project(id).await
    }
    async fn find_project_by_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<Project>, DbError> {
        self.inner.find_project_by_name(owner_id, name).await
    }
    async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, DbError> {
        self.inner.list_projects(owner_id).await
    }
    async fn update_project(&self, id: &str, update: &UpdateProject) -> Result<Project, DbError> {
        self.inner.update_project(id, update).await
    }
    async fn upsert_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        self.inner.upsert_project(input).await
    }
    async fn delete_project(&self, id: &str) -> Result<(), DbError> {
        self.inner.delete_project(id).await
    }

    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.inner.create_task(input).await
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        self.inner.get_task(id).await
    }
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        self.inner.list_tasks(filter).await
    }
    async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        self.inner.update_task(id, update).await
    }
    async fn delete_task(&self, id: &str) -> Result<(), DbError> {
        self.inner.delete_task(id).await
    }

    async fn get_task_meta(&self, task_id: &str) -> Result<Option<TaskMeta>, DbError> {
        self.inner.get_task_meta(task_id).await
    }
    async fn find_task_by_remote_id(
        &self,
        project_id: &str,
        source: TaskSource,
        remote_card_id: &str,
    ) -> Result<Option<Task>, DbError> {
        self.inner
            .find_task_by_remote_id(project_id, source, remote_card_id)
            .await
    }
    async fn upsert_meta(&self, task_id: &str, fields: &MetaFields) -> Result<TaskMeta, DbError> {
        self.inner.upsert_meta(task_id, fields).await
    }
    async fn create_task_with_meta(
        &self,
        task: &CreateTask,
        meta: &MetaFields,
    ) -> Result<LinkedTask, DbError> {
        if meta.remote_card_id.as_deref() == Some(self.fail_card.as_str()) {
            return Err(DbError::Internal("disk I/O error".into()));
        }
        self.inner.create_task_with_meta(task, meta).await
    }
    async fn update_task_with_meta(
        &self,
        task_id: &str,
        update: &UpdateTask,
        meta: &MetaFields,
    ) -> Result<LinkedTask, DbError> {
        self.inner.update_task_with_meta(task_id, update, meta).await
    }
    async fn list_linked_tasks(&self, project_id: &str) -> Result<Vec<LinkedTask>, DbError> {
        self.inner.list_linked_tasks(project_id).await
    }
}
