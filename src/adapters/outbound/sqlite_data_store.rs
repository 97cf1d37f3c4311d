//! SQLite Data Store
//!
//! Implements DataStore as a single key/value table in a SQLite file.

use crate::domain::errors::EdgeError;
use crate::domain::ports::DataStore;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)";

/// SQLite-backed key/value store.
///
/// Values are stored as JSON text. The connection is dropped on close.
pub struct SqliteDataStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteDataStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, EdgeError> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| EdgeError::DataStore("store is closed".to_string()))?;
        f(conn).map_err(|e| EdgeError::DataStore(e.to_string()))
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, EdgeError> {
        let raw: Option<String> = self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        })?;

        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| EdgeError::DataStore(e.to_string()))
        })
        .transpose()
    }

    pub fn put(&self, key: &str, value: &Value) -> Result<(), EdgeError> {
        let text = value.to_string();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                     updated_at = strftime('%s', 'now')",
                params![key, text],
            )
        })?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn remove(&self, key: &str) -> Result<bool, EdgeError> {
        let removed = self.with_conn(|conn| conn.execute("DELETE FROM kv WHERE key = ?1", params![key]))?;
        Ok(removed > 0)
    }

    pub fn len(&self) -> Result<usize, EdgeError> {
        let count: i64 =
            self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0)))?;
        Ok(count as usize)
    }
}

impl DataStore for SqliteDataStore {
    fn close(&self) -> Result<(), EdgeError> {
        let conn = self
            .conn
            .lock()
            .take()
            .ok_or_else(|| EdgeError::DataStore("store already closed".to_string()))?;
        conn.close()
            .map_err(|(_, e)| EdgeError::DataStore(e.to_string()))?;
        tracing::debug!("sqlite data store closed");
        Ok(())
    }
}
