//! Schema migrations for the SQLite document store.

use rusqlite::Connection;
use tracing::info;

use civic_core::CivicError;

/// Apply every migration newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), CivicError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CivicError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CivicError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: documents");
    }

    Ok(())
}

/// Version 1: append-only documents keyed by collection path.
///
/// `seq` preserves arrival order; `created_at` is the commit time in
/// milliseconds since the epoch.
fn apply_v1(conn: &Connection) -> Result<(), CivicError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            collection  TEXT NOT NULL,
            fields      TEXT NOT NULL DEFAULT '{}',
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents (collection, seq);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'documents');
        ",
    )
    .map_err(|e| CivicError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
