//! In-process document store.
//!
//! Commit timestamps are strictly increasing per store. Two switches make
//! the store useful for exercising clients:
//!
//! * `hold_commits(true)` keeps new documents pending (`created_at == None`
//!   in every snapshot) until [`MemoryStore::commit_pending`] reveals the
//!   server time recorded at write.
//! * `fail_writes(true)` / `fail_subscriptions(true)` inject backend
//!   failures.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use civic_core::{CivicError, Result, Timestamp};

use crate::document::{
    CollectionPath, Document, DocumentFields, DocumentId, DocumentStore, EqualityFilter,
    SnapshotStream,
};
use crate::listeners::ListenerRegistry;

#[derive(Debug, Clone)]
struct StoredDocument {
    id: DocumentId,
    fields: DocumentFields,
    server_time: Timestamp,
    committed: bool,
}

impl StoredDocument {
    fn view(&self) -> Document {
        Document {
            id: self.id.clone(),
            fields: self.fields.clone(),
            created_at: self.committed.then_some(self.server_time),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<CollectionPath, Vec<StoredDocument>>,
    last_time: Option<Timestamp>,
    hold_commits: bool,
    fail_writes: bool,
    fail_subscriptions: bool,
}

impl Inner {
    fn next_time(&mut self) -> Timestamp {
        let now = Utc::now();
        let time = match self.last_time {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        self.last_time = Some(time);
        time
    }

    fn select(&self, path: &CollectionPath, filter: &EqualityFilter) -> Vec<Document> {
        self.collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .filter(|d| filter.matches(&d.fields))
                    .map(StoredDocument::view)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Document store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    listeners: ListenerRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep subsequent writes pending until [`commit_pending`](Self::commit_pending).
    pub fn hold_commits(&self, hold: bool) -> Result<()> {
        self.lock()?.hold_commits = hold;
        Ok(())
    }

    /// Resolve every pending document and notify listeners of the affected
    /// collections. Returns the number of documents committed.
    pub fn commit_pending(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let mut committed = 0;
        let mut touched = Vec::new();
        for (path, docs) in inner.collections.iter_mut() {
            let before = committed;
            for doc in docs.iter_mut().filter(|d| !d.committed) {
                doc.committed = true;
                committed += 1;
            }
            if committed > before {
                touched.push(path.clone());
            }
        }
        for path in &touched {
            self.listeners
                .notify(path, |filter| Ok(inner.select(path, filter)))?;
        }
        debug!(committed, "Committed pending documents");
        Ok(committed)
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_writes = fail;
        Ok(())
    }

    /// Fail every active listener and every subsequent subscription.
    pub fn fail_subscriptions(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_subscriptions = fail;
        if fail {
            self.listeners.fail_all("listener failed")?;
        }
        Ok(())
    }

    /// Active listener count.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| CivicError::Storage(format!("Memory store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn add_document(
        &self,
        path: &CollectionPath,
        fields: DocumentFields,
    ) -> Result<DocumentId> {
        let mut inner = self.lock()?;
        if inner.fail_writes {
            warn!(collection = %path, "Rejecting write: write failure injected");
            return Err(CivicError::Storage("write rejected by backend".into()));
        }

        let id = Uuid::new_v4().simple().to_string();
        let doc = StoredDocument {
            id: id.clone(),
            fields,
            server_time: inner.next_time(),
            committed: !inner.hold_commits,
        };
        inner.collections.entry(path.clone()).or_default().push(doc);
        debug!(collection = %path, id = %id, "Document added");

        self.listeners
            .notify(path, |filter| Ok(inner.select(path, filter)))?;
        Ok(id)
    }

    async fn query(&self, path: &CollectionPath, filter: &EqualityFilter) -> Result<Vec<Document>> {
        Ok(self.lock()?.select(path, filter))
    }

    async fn subscribe(
        &self,
        path: &CollectionPath,
        filter: EqualityFilter,
    ) -> Result<SnapshotStream> {
        let inner = self.lock()?;
        if inner.fail_subscriptions {
            warn!(collection = %path, "Subscription failure injected");
            return Ok(ListenerRegistry::failed(CivicError::Subscription(
                "listener failed".into(),
            )));
        }
        let initial = inner.select(path, &filter);
        self.listeners.register(path, filter, initial)
    }
}
