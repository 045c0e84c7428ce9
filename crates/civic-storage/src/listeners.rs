//! Snapshot listener bookkeeping shared by the store implementations.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use civic_core::{CivicError, Result};

use crate::document::{CollectionPath, Document, EqualityFilter, SnapshotStream};

struct Listener {
    path: CollectionPath,
    filter: EqualityFilter,
    tx: mpsc::UnboundedSender<Result<Vec<Document>>>,
}

/// Registered subscriptions. Listeners whose stream was dropped are pruned
/// on the next notification.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and deliver `initial` as its first snapshot.
    pub fn register(
        &self,
        path: &CollectionPath,
        filter: EqualityFilter,
        initial: Vec<Document>,
    ) -> Result<SnapshotStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive here, so the send cannot fail.
        let _ = tx.send(Ok(initial));
        let mut listeners = self.lock()?;
        listeners.push(Listener {
            path: path.clone(),
            filter,
            tx,
        });
        debug!(collection = %path, total = listeners.len(), "Listener registered");
        Ok(SnapshotStream::new(rx))
    }

    /// A stream whose only item is `err`.
    pub fn failed(err: CivicError) -> SnapshotStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Err(err));
        SnapshotStream::new(rx)
    }

    /// Push a fresh snapshot to every listener on `path`.
    ///
    /// `snapshot` computes the result set for one listener's filter.
    pub fn notify<F>(&self, path: &CollectionPath, mut snapshot: F) -> Result<()>
    where
        F: FnMut(&EqualityFilter) -> Result<Vec<Document>>,
    {
        let mut listeners = self.lock()?;
        listeners.retain(|l| {
            if l.path != *path {
                return !l.tx.is_closed();
            }
            let item = snapshot(&l.filter);
            l.tx.send(item).is_ok()
        });
        Ok(())
    }

    /// Fail and drop every listener.
    pub fn fail_all(&self, reason: &str) -> Result<()> {
        let mut listeners = self.lock()?;
        if !listeners.is_empty() {
            warn!(count = listeners.len(), reason, "Failing all listeners");
        }
        for l in listeners.drain(..) {
            let _ = l.tx.send(Err(CivicError::Subscription(reason.to_string())));
        }
        Ok(())
    }

    /// Number of listeners not yet pruned.
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .map(|l| l.iter().filter(|l| !l.tx.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Listener>>> {
        self.listeners
            .lock()
            .map_err(|e| CivicError::Storage(format!("Listener registry lock poisoned: {}", e)))
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
