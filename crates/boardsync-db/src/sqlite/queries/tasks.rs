use chrono::Utc;
use rusqlite::{params, Connection, Row};

use boardsync_core::task::{CreateTask, Priority, Status, Task, TaskFilter, UpdateTask};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

pub(crate) fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let priority_str: String = row.get("priority")?;
    let is_imported: i32 = row.get("is_imported")?;
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: row.get("due_date")?,
        status: Status::parse_str(&status_str).unwrap_or_default(),
        priority: Priority::parse_str(&priority_str).unwrap_or_default(),
        is_imported: is_imported != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn select_task(conn: &Connection, id: &str) -> Result<Task, DbError> {
    conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .map_err(not_found_or(|| format!("task {id}")))
}

pub(crate) fn insert_task(conn: &Connection, input: &CreateTask) -> Result<Task, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO tasks (
            id, project_id, title, description, due_date,
            status, priority, is_imported, created_at, updated_at
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            input.project_id,
            input.title,
            input.description,
            input.due_date,
            input.status.as_str(),
            input.priority.as_str(),
            input.is_imported as i32,
            now,
            now,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            DbError::NotFound(format!("project {}", input.project_id))
        }
        other => super::super::map_sqlite_err(other),
    })?;
    select_task(conn, &id)
}

pub(crate) fn apply_task_update(
    conn: &Connection,
    id: &str,
    update: &UpdateTask,
) -> Result<Task, DbError> {
    if update.is_empty() {
        return select_task(conn, id);
    }

    let now = Utc::now();
    let mut sets = vec!["updated_at = ?1".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

    if let Some(ref title) = update.title {
        param_values.push(Box::new(title.clone()));
        sets.push(format!("title = ?{}", param_values.len()));
    }
    if let Some(ref description) = update.description {
        param_values.push(Box::new(description.clone()));
        sets.push(format!("description = ?{}", param_values.len()));
    }
    if let Some(due_date) = update.due_date {
        param_values.push(Box::new(due_date));
        sets.push(format!("due_date = ?{}", param_values.len()));
    }
    if let Some(status) = update.status {
        param_values.push(Box::new(status.as_str().to_string()));
        sets.push(format!("status = ?{}", param_values.len()));
    }
    if let Some(priority) = update.priority {
        param_values.push(Box::new(priority.as_str().to_string()));
        sets.push(format!("priority = ?{}", param_values.len()));
    }
    if let Some(is_imported) = update.is_imported {
        param_values.push(Box::new(is_imported as i32));
        sets.push(format!("is_imported = ?{}", param_values.len()));
    }

    param_values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE tasks SET {} WHERE id = ?{}",
        sets.join(", "),
        param_values.len()
    );
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let changed = conn.execute(&sql, params_ref.as_slice()).to_db()?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("task {id}")));
    }
    select_task(conn, id)
}

impl SqliteDatabase {
    pub fn create_task_sync(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| insert_task(conn, input))
    }

    pub fn get_task_sync(&self, id: &str) -> Result<Task, DbError> {
        self.with_conn(|conn| select_task(conn, id))
    }

    pub fn list_tasks_sync(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(ref project_id) = filter.project_id {
                param_values.push(Box::new(project_id.clone()));
                sql.push_str(&format!(" AND project_id = ?{}", param_values.len()));
            }
            if let Some(status) = filter.status {
                param_values.push(Box::new(status.as_str().to_string()));
                sql.push_str(&format!(" AND status = ?{}", param_values.len()));
            }
            if let Some(priority) = filter.priority {
                param_values.push(Box::new(priority.as_str().to_string()));
                sql.push_str(&format!(" AND priority = ?{}", param_values.len()));
            }
            if let Some(is_imported) = filter.is_imported {
                param_values.push(Box::new(is_imported as i32));
                sql.push_str(&format!(" AND is_imported = ?{}", param_values.len()));
            }

            sql.push_str(" ORDER BY created_at ASC, rowid ASC");

            if let Some(limit) = filter.limit {
                param_values.push(Box::new(limit));
                sql.push_str(&format!(" LIMIT ?{}", param_values.len()));
            }

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn.prepare(&sql).to_db()?;
            let tasks = stmt
                .query_map(params_ref.as_slice(), row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(tasks)
        })
    }

    pub fn update_task_sync(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| apply_task_update(conn, id, update))
    }

    pub fn delete_task_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }
}
