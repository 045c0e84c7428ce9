//! SQLite connection management.
//!
//! A single rusqlite `Connection` behind a `Mutex`, opened in WAL mode with
//! migrations applied before first use.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use civic_core::CivicError;

use crate::migrations;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

/// Thread-safe SQLite database handle.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, CivicError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| CivicError::Storage(format!("Failed to open database: {}", e)))?;
        let db = Self::configure(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, CivicError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CivicError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, CivicError> {
        conn.execute_batch(PRAGMAS)
            .map_err(|e| CivicError::Storage(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CivicError>
    where
        F: FnOnce(&Connection) -> Result<T, CivicError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CivicError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
