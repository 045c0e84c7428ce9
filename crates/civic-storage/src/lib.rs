//! Document store for conversation transcripts.
//!
//! Defines the [`DocumentStore`] abstraction (append, equality query and
//! live snapshot subscription over a collection path) with an in-memory
//! implementation and a WAL-mode SQLite implementation. Both share the
//! same listener registry so subscribers always receive full result sets.

pub mod db;
pub mod document;
pub mod listeners;
pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use db::Database;
pub use document::{
    CollectionPath, Document, DocumentFields, DocumentId, DocumentStore, EqualityFilter,
    SnapshotStream, to_fields,
};
pub use listeners::ListenerRegistry;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
