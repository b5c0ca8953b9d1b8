//! SQLite storage backend.
//!
//! All records live in one `records` table keyed by namespace. The schema is
//! created on open and is idempotent, so opening an existing database is safe.

use super::KeyValueStore;
use crate::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// A [`KeyValueStore`] on a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `db_path` and initialises the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// created.
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        debug!("Opening database at: {:?}", db_path);
        let conn = Connection::open(db_path)?;
        let store = Self::with_connection(conn)?;
        info!("Database opened successfully");
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Creates the `records` table if it does not exist.
fn create_tables(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            namespace TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn read(&self, namespace: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let payload = conn
            .query_row(
                "SELECT payload FROM records WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write(&self, namespace: &str, payload: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            r#"
            INSERT INTO records (namespace, payload, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(namespace) DO UPDATE SET
                payload = excluded.payload,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![namespace, payload],
        )?;
        Ok(())
    }

    fn remove(&self, namespace: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM records WHERE namespace = ?1", params![namespace])?;
        Ok(())
    }
}
