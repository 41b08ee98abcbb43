use super::StatisticsDocument;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

/// Shared, lock-guarded access to the session's statistics document.
///
/// Writers go through [`DocumentHandle::modify`], which serializes them and
/// bumps a revision counter that subscribers can watch instead of polling.
/// A poisoned lock is recovered rather than propagated: the document is only
/// ever mutated in small all-or-nothing steps, so the data behind it is still
/// usable.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    doc: Arc<RwLock<StatisticsDocument>>,
    revision: Arc<watch::Sender<u64>>,
}

impl DocumentHandle {
    pub fn new(doc: StatisticsDocument) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            doc: Arc::new(RwLock::new(doc)),
            revision: Arc::new(revision),
        }
    }

    /// Runs `f` against the current document under a read lock.
    pub fn read<R>(&self, f: impl FnOnce(&StatisticsDocument) -> R) -> R {
        f(&self.read_guard())
    }

    /// A copy of the current document, e.g. for saving.
    pub fn snapshot(&self) -> StatisticsDocument {
        self.read_guard().clone()
    }

    /// Runs `f` under the write lock. `f` reports whether it changed anything;
    /// subscribers are only notified when it did.
    pub fn modify(&self, f: impl FnOnce(&mut StatisticsDocument) -> bool) -> bool {
        let changed = {
            let mut doc = self.write_guard();
            f(&mut doc)
        };
        if changed {
            self.revision.send_modify(|rev| *rev += 1);
        }
        changed
    }

    /// Number of effective changes made through this handle.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// A receiver that wakes up after every effective change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, StatisticsDocument> {
        self.doc.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, StatisticsDocument> {
        self.doc.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
