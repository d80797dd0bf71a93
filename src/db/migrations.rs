use rusqlite::Connection;

use crate::error::TrackerError;

pub fn run_migrations(conn: &Connection) -> Result<(), TrackerError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            progress REAL NOT NULL DEFAULT 0
                CHECK (progress >= 0 AND progress <= 1),
            progress_done_on TEXT,
            project_id TEXT
        );

        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            color TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_position ON tasks(position);
        ",
    )?;
    Ok(())
}
