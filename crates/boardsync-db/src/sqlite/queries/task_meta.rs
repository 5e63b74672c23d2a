use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use boardsync_core::project::TaskSource;
use boardsync_core::task::{CreateTask, Task, UpdateTask};
use boardsync_core::task_meta::{MetaFields, RemoteState, TaskMeta};

use super::super::{SqliteDatabase, SqliteResultExt};
use super::tasks::{apply_task_update, insert_task, row_to_task, select_task};
use crate::{DbError, LinkedTask};

fn row_to_meta(row: &Row) -> rusqlite::Result<TaskMeta> {
    let source_str: String = row.get("source")?;
    let state_str: String = row.get("remote_state")?;
    let extra_str: String = row.get("extra")?;
    Ok(TaskMeta {
        task_id: row.get("task_id")?,
        source: TaskSource::parse_str(&source_str).unwrap_or_default(),
        remote_card_id: row.get("remote_card_id")?,
        remote_state: RemoteState::parse_str(&state_str).unwrap_or_default(),
        remote_url: row.get("remote_url")?,
        extra: serde_json::from_str(&extra_str)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn select_meta(conn: &Connection, task_id: &str) -> Result<Option<TaskMeta>, DbError> {
    conn.query_row(
        "SELECT * FROM task_meta WHERE task_id = ?1",
        params![task_id],
        row_to_meta,
    )
    .optional()
    .to_db()
}

fn extra_json(fields: &MetaFields) -> Option<String> {
    fields.extra.as_ref().map(|v| v.to_string())
}

fn write_meta(conn: &Connection, task: &Task, fields: &MetaFields) -> Result<TaskMeta, DbError> {
    let now = Utc::now();
    match select_meta(conn, &task.id)? {
        None => {
            conn.execute(
                "INSERT INTO task_meta (
                    task_id, project_id, source, remote_card_id, remote_state,
                    remote_url, extra, created_at, updated_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    task.id,
                    task.project_id,
                    fields.source.unwrap_or_default().as_str(),
                    fields.remote_card_id,
                    fields.remote_state.unwrap_or_default().as_str(),
                    fields.remote_url.clone().flatten(),
                    extra_json(fields).unwrap_or_else(|| "{}".into()),
                    now,
                    now,
                ],
            )
            .to_db()?;
        }
        Some(_) => {
            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

            if let Some(source) = fields.source {
                values.push(Box::new(source.as_str().to_string()));
                sets.push(format!("source = ?{}", values.len()));
            }
            if let Some(ref card_id) = fields.remote_card_id {
                values.push(Box::new(card_id.clone()));
                sets.push(format!("remote_card_id = ?{}", values.len()));
            }
            if let Some(state) = fields.remote_state {
                values.push(Box::new(state.as_str().to_string()));
                sets.push(format!("remote_state = ?{}", values.len()));
            }
            if let Some(ref url) = fields.remote_url {
                // an inner None clears the column
                values.push(Box::new(url.clone()));
                sets.push(format!("remote_url = ?{}", values.len()));
            }
            if let Some(extra) = extra_json(fields) {
                values.push(Box::new(extra));
                sets.push(format!("extra = ?{}", values.len()));
            }

            values.push(Box::new(task.id.clone()));
            let sql = format!(
                "UPDATE task_meta SET {} WHERE task_id = ?{}",
                sets.join(", "),
                values.len()
            );
            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(|v| v.as_ref()).collect();
            conn.execute(&sql, params_ref.as_slice()).to_db()?;
        }
    }
    select_meta(conn, &task.id)?
        .ok_or_else(|| DbError::Internal(format!("meta for task {} vanished", task.id)))
}

impl SqliteDatabase {
    pub fn get_task_meta_sync(&self, task_id: &str) -> Result<Option<TaskMeta>, DbError> {
        self.with_conn(|conn| select_meta(conn, task_id))
    }

    pub fn find_task_by_remote_id_sync(
        &self,
        project_id: &str,
        source: TaskSource,
        remote_card_id: &str,
    ) -> Result<Option<Task>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT t.* FROM tasks t
                 JOIN task_meta m ON m.task_id = t.id
                 WHERE t.project_id = ?1 AND m.source = ?2 AND m.remote_card_id = ?3",
                params![project_id, source.as_str(), remote_card_id],
                row_to_task,
            )
            .optional()
            .to_db()
        })
    }

    pub fn upsert_meta_sync(&self, task_id: &str, fields: &MetaFields) -> Result<TaskMeta, DbError> {
        self.with_conn(|conn| {
            let task = select_task(conn, task_id)?;
            write_meta(conn, &task, fields)
        })
    }

    pub fn create_task_with_meta_sync(
        &self,
        input: &CreateTask,
        fields: &MetaFields,
    ) -> Result<LinkedTask, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let task = insert_task(&tx, input)?;
            let meta = write_meta(&tx, &task, fields)?;
            tx.commit().to_db()?;
            Ok(LinkedTask {
                task,
                meta: Some(meta),
            })
        })
    }

    pub fn update_task_with_meta_sync(
        &self,
        task_id: &str,
        update: &UpdateTask,
        fields: &MetaFields,
    ) -> Result<LinkedTask, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let task = apply_task_update(&tx, task_id, update)?;
            let meta = write_meta(&tx, &task, fields)?;
            tx.commit().to_db()?;
            Ok(LinkedTask {
                task,
                meta: Some(meta),
            })
        })
    }

    pub fn list_linked_tasks_sync(&self, project_id: &str) -> Result<Vec<LinkedTask>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM tasks WHERE project_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .to_db()?;
            let tasks = stmt
                .query_map(params![project_id], row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            let mut linked = Vec::with_capacity(tasks.len());
            for task in tasks {
                let meta = select_meta(conn, &task.id)?;
                linked.push(LinkedTask { task, meta });
            }
            Ok(linked)
        })
    }
}
