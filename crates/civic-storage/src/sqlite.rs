//! SQLite-backed document store.
//!
//! Documents are stored as JSON text; equality filters are evaluated after
//! loading a collection, which keeps the schema independent of the record
//! shape. Writes commit synchronously, so snapshots never carry pending
//! timestamps.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, warn};
use uuid::Uuid;

use civic_core::{CivicError, Result, Timestamp};

use crate::db::Database;
use crate::document::{
    CollectionPath, Document, DocumentFields, DocumentId, DocumentStore, EqualityFilter,
    SnapshotStream,
};
use crate::listeners::ListenerRegistry;

/// Document store persisted in a WAL-mode SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    db: Database,
    last_millis: Mutex<i64>,
    /// Held across write+notify and select+register, so a new listener
    /// never misses a write that lands while it is being registered.
    publish: Mutex<()>,
    listeners: ListenerRegistry,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_database(Database::new(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_database(Database::in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self> {
        let last: i64 = db.with_conn(|conn| {
            conn.query_row("SELECT COALESCE(MAX(created_at), 0) FROM documents", [], |row| {
                row.get(0)
            })
            .map_err(|e| CivicError::Storage(format!("Failed to read last commit time: {}", e)))
        })?;
        Ok(Self {
            db,
            last_millis: Mutex::new(last),
            publish: Mutex::new(()),
            listeners: ListenerRegistry::new(),
        })
    }

    /// Strictly increasing commit time in epoch milliseconds.
    fn next_millis(&self) -> Result<i64> {
        let mut last = self
            .last_millis
            .lock()
            .map_err(|e| CivicError::Storage(format!("Clock lock poisoned: {}", e)))?;
        let now = Utc::now().timestamp_millis();
        *last = if now > *last { now } else { *last + 1 };
        Ok(*last)
    }

    fn publish_lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.publish
            .lock()
            .map_err(|e| CivicError::Storage(format!("Publish lock poisoned: {}", e)))
    }

    fn select(&self, path: &CollectionPath, filter: &EqualityFilter) -> Result<Vec<Document>> {
        self.db.with_conn(|conn| load_collection(conn, path, filter))
    }
}

fn load_collection(
    conn: &Connection,
    path: &CollectionPath,
    filter: &EqualityFilter,
) -> Result<Vec<Document>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, fields, created_at FROM documents
             WHERE collection = ?1 ORDER BY seq ASC",
        )
        .map_err(|e| CivicError::Storage(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map(params![path.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| CivicError::Storage(format!("Failed to query documents: {}", e)))?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, raw, millis) =
            row.map_err(|e| CivicError::Storage(format!("Failed to read row: {}", e)))?;
        let fields: DocumentFields = match serde_json::from_str(&raw) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping document with unreadable fields");
                continue;
            }
        };
        if !filter.matches(&fields) {
            continue;
        }
        documents.push(Document {
            id,
            fields,
            created_at: from_millis(millis),
        });
    }
    Ok(documents)
}

fn from_millis(millis: i64) -> Option<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn add_document(
        &self,
        path: &CollectionPath,
        fields: DocumentFields,
    ) -> Result<DocumentId> {
        let id = Uuid::new_v4().simple().to_string();
        let raw = serde_json::to_string(&fields)?;
        let _publish = self.publish_lock()?;
        let millis = self.next_millis()?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, fields, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, path.as_str(), raw, millis],
            )
            .map_err(|e| CivicError::Storage(format!("Failed to insert document: {}", e)))?;
            Ok(())
        })?;
        debug!(collection = %path, id = %id, "Document stored");

        self.listeners
            .notify(path, |filter| self.select(path, filter))?;
        Ok(id)
    }

    async fn query(&self, path: &CollectionPath, filter: &EqualityFilter) -> Result<Vec<Document>> {
        self.select(path, filter)
    }

    async fn subscribe(
        &self,
        path: &CollectionPath,
        filter: EqualityFilter,
    ) -> Result<SnapshotStream> {
        let _publish = self.publish_lock()?;
        let initial = self.select(path, &filter)?;
        self.listeners.register(path, filter, initial)
    }
}
