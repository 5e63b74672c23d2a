use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use boardsync_core::project::{CreateProject, Project, TaskSource, UpdateProject};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    let source_str: String = row.get("source")?;
    Ok(Project {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        source: TaskSource::parse_str(&source_str).unwrap_or_default(),
        remote_board_id: row.get("remote_board_id")?,
        remote_default_list_id: row.get("remote_default_list_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn select_project(conn: &Connection, id: &str) -> Result<Project, DbError> {
    conn.query_row(
        "SELECT * FROM projects WHERE id = ?1",
        params![id],
        row_to_project,
    )
    .map_err(not_found_or(|| format!("project {id}")))
}

fn insert_project(conn: &Connection, input: &CreateProject) -> Result<Project, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO projects (
            id, owner_id, name, description, source,
            remote_board_id, remote_default_list_id, created_at, updated_at
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            input.owner_id,
            input.name,
            input.description,
            input.source.as_str(),
            input.remote_board_id,
            input.remote_default_list_id,
            now,
            now,
        ],
    )
    .to_db()?;
    select_project(conn, &id)
}

fn apply_project_update(
    conn: &Connection,
    id: &str,
    update: &UpdateProject,
) -> Result<Project, DbError> {
    let mut sets = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(ref name) = update.name {
        sets.push("name = ?");
        values.push(Box::new(name.clone()));
    }
    if let Some(ref description) = update.description {
        sets.push("description = ?");
        values.push(Box::new(description.clone()));
    }
    if let Some(source) = update.source {
        sets.push("source = ?");
        values.push(Box::new(source.as_str().to_string()));
    }
    if let Some(ref board_id) = update.remote_board_id {
        sets.push("remote_board_id = ?");
        values.push(Box::new(board_id.clone()));
    }
    if let Some(ref list_id) = update.remote_default_list_id {
        sets.push("remote_default_list_id = ?");
        values.push(Box::new(list_id.clone()));
    }

    if sets.is_empty() {
        return select_project(conn, id);
    }

    sets.push("updated_at = ?");
    values.push(Box::new(Utc::now()));
    values.push(Box::new(id.to_string()));

    let sql = format!("UPDATE projects SET {} WHERE id = ?", sets.join(", "));
    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let changed = conn.execute(&sql, params.as_slice()).to_db()?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("project {id}")));
    }
    select_project(conn, id)
}

impl SqliteDatabase {
    pub fn create_project_sync(&self, input: &CreateProject) -> Result<Project, DbError> {
        self.with_conn(|conn| insert_project(conn, input))
    }

    pub fn get_project_sync(&self, id: &str) -> Result<Project, DbError> {
        self.with_conn(|conn| select_project(conn, id))
    }

    pub fn find_project_by_name_sync(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<Project>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM projects WHERE owner_id = ?1 AND name = ?2",
                params![owner_id, name],
                row_to_project,
            )
            .optional()
            .to_db()
        })
    }

    pub fn list_projects_sync(&self, owner_id: &str) -> Result<Vec<Project>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM projects WHERE owner_id = ?1 ORDER BY name")
                .to_db()?;
            let projects = stmt
                .query_map(params![owner_id], row_to_project)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(projects)
        })
    }

    pub fn update_project_sync(
        &self,
        id: &str,
        update: &UpdateProject,
    ) -> Result<Project, DbError> {
        self.with_conn(|conn| apply_project_update(conn, id, update))
    }

    /// Re-importing the same board under the same name lands on the same row.
    /// Only the linkage and description are refreshed on an existing project;
    /// a default list already chosen is kept unless a new one is supplied or
    /// the project now points at a different board.
    pub fn upsert_project_sync(&self, input: &CreateProject) -> Result<Project, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let existing = tx
                .query_row(
                    "SELECT * FROM projects WHERE owner_id = ?1 AND name = ?2",
                    params![input.owner_id, input.name],
                    row_to_project,
                )
                .optional()
                .to_db()?;

            let project = match existing {
                None => insert_project(&tx, input)?,
                Some(project) => {
                    let board_changed = project.remote_board_id != input.remote_board_id;
                    let remote_default_list_id = match input.remote_default_list_id {
                        Some(ref list) => Some(Some(list.clone())),
                        // a list chosen on the previous board is meaningless now
                        None if board_changed => Some(None),
                        None => None,
                    };
                    let update = UpdateProject {
                        description: Some(input.description.clone()),
                        source: Some(input.source),
                        remote_board_id: Some(input.remote_board_id.clone()),
                        remote_default_list_id,
                        ..Default::default()
                    };
                    apply_project_update(&tx, &project.id, &update)?
                }
            };
            tx.commit().to_db()?;
            Ok(project)
        })
    }

    pub fn delete_project_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM projects WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("project {id}")));
            }
            Ok(())
        })
    }
}
