use std::fs;
use std::path::Path;

use rusqlite::Connection;

use crate::error::TrackerError;

use super::migrations;

/// Open the server database. Returns error if not initialized.
pub fn open_db(path: &Path) -> Result<Connection, TrackerError> {
    if !path.exists() {
        return Err(TrackerError::not_initialized());
    }
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Initialize the database: create directories, database, and run migrations.
pub fn init_db(path: &Path) -> Result<(), TrackerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TrackerError::database(e.to_string()))?;
    }
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(())
}

/// Fresh migrated database that lives as long as the connection.
pub fn open_in_memory() -> Result<Connection, TrackerError> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> Result<(), TrackerError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}

/// Runs `f` inside `BEGIN IMMEDIATE` … `COMMIT`, rolling back on error, so a
/// position shift and the row change it accompanies land together.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, TrackerError>,
) -> Result<T, TrackerError> {
    conn.execute_batch("BEGIN IMMEDIATE")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
