//! Durable key/value storage backing the client's queue and mirror.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::TrackerError;

pub const QUEUE_KEY: &str = "requestQueue";
pub const TASKS_KEY: &str = "tasks";
pub const PROJECTS_KEY: &str = "projects";

/// A synchronous string store. `save` must be durable when it returns.
pub trait LocalStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, TrackerError>;
    fn save(&self, key: &str, value: &str) -> Result<(), TrackerError>;
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, TrackerError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// SQLite-file store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, TrackerError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, TrackerError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, TrackerError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS local_store (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LocalStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM local_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.conn.lock().execute(
            "INSERT INTO local_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Loads a JSON array stored under `key`; a missing key is an empty list.
pub fn load_list<T: serde::de::DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> Result<Vec<T>, TrackerError> {
    match store.load(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| TrackerError::storage(format!("Corrupt local state under '{key}': {e}"))),
        None => Ok(Vec::new()),
    }
}

pub fn save_list<T: serde::Serialize>(
    store: &dyn LocalStore,
    key: &str,
    items: &[T],
) -> Result<(), TrackerError> {
    let raw = serde_json::to_string(items)?;
    store.save(key, &raw)
}
