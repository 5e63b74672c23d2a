use chrono::Utc;
use rusqlite::{params, Connection};

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS projects (
            id                      TEXT PRIMARY KEY,
            owner_id                TEXT NOT NULL,
            name                    TEXT NOT NULL,
            description             TEXT NOT NULL DEFAULT '',
            source                  TEXT NOT NULL DEFAULT 'none'
                                        CHECK(source IN ('none', 'trello')),
            remote_board_id         TEXT,
            remote_default_list_id  TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL,
            CHECK(source = 'none' OR remote_board_id IS NOT NULL)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_owner_name
            ON projects(owner_id, name);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_owner_board
            ON projects(owner_id, remote_board_id)
            WHERE remote_board_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            description TEXT,
            due_date    TEXT,
            status      TEXT NOT NULL DEFAULT 'pending'
                            CHECK(status IN ('pending', 'in_progress', 'completed')),
            priority    TEXT NOT NULL DEFAULT 'medium'
                            CHECK(priority IN ('low', 'medium', 'high')),
            is_imported INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);

        CREATE TABLE IF NOT EXISTS task_meta (
            task_id         TEXT PRIMARY KEY REFERENCES tasks(id) ON DELETE CASCADE,
            project_id      TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            source          TEXT NOT NULL DEFAULT 'none'
                                CHECK(source IN ('none', 'trello')),
            remote_card_id  TEXT,
            remote_state    TEXT NOT NULL DEFAULT 'active'
                                CHECK(remote_state IN ('active', 'archived')),
            remote_url      TEXT,
            extra           TEXT NOT NULL DEFAULT '{}',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_task_meta_remote
            ON task_meta(project_id, source, remote_card_id)
            WHERE remote_card_id IS NOT NULL;
        ",
    )
    .to_db()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .to_db()?;

    tracing::debug!(current_version, "sqlite schema version");

    if current_version < 1 {
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![1, Utc::now()],
        )
        .to_db()?;
    }

    Ok(())
}
