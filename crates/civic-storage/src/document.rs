//! Documents, collection paths and the store trait.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use civic_core::config::sanitize_app_id;
use civic_core::{CivicError, Result, Timestamp};

/// Identifier assigned by the store on append.
pub type DocumentId = String;

/// Field map of a stored document.
pub type DocumentFields = serde_json::Map<String, Value>;

/// Slash-separated collection address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Per-identity message collection:
    /// `artifacts/{appId}/users/{uid}/messages`.
    pub fn messages(app_id: &str, uid: &str) -> Self {
        Self(format!(
            "artifacts/{}/users/{}/messages",
            sanitize_app_id(app_id),
            uid
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-field equality predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityFilter {
    pub field: String,
    pub value: Value,
}

impl EqualityFilter {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &DocumentFields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

/// A stored document as returned by queries and snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: DocumentFields,
    /// Server commit time; `None` while the write is still pending.
    pub created_at: Option<Timestamp>,
}

impl Document {
    /// Deserialize the field map into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Serialize a record into a field map. Non-object values are rejected.
pub fn to_fields<T: Serialize>(record: &T) -> Result<DocumentFields> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(CivicError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Live result-set feed of a subscription.
///
/// Every item is the complete current result set (or the error that ended
/// the listener). Dropping the stream unsubscribes.
#[derive(Debug)]
pub struct SnapshotStream {
    rx: mpsc::UnboundedReceiver<Result<Vec<Document>>>,
}

impl SnapshotStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<Vec<Document>>>) -> Self {
        Self { rx }
    }

    /// Next snapshot, or `None` once the store has dropped the listener.
    pub async fn next(&mut self) -> Option<Result<Vec<Document>>> {
        self.rx.recv().await
    }

    /// Snapshot already queued, without waiting.
    pub fn try_next(&mut self) -> Option<Result<Vec<Document>>> {
        self.rx.try_recv().ok()
    }
}

/// Append-only document store with equality queries and live listeners.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document; the store assigns its id and commit timestamp.
    async fn add_document(&self, path: &CollectionPath, fields: DocumentFields)
        -> Result<DocumentId>;

    /// Documents of `path` matching `filter`, in arrival order.
    async fn query(&self, path: &CollectionPath, filter: &EqualityFilter) -> Result<Vec<Document>>;

    /// Subscribe to the result set of `filter` over `path`. The current
    /// result set is delivered immediately.
    async fn subscribe(&self, path: &CollectionPath, filter: EqualityFilter)
        -> Result<SnapshotStream>;
}
