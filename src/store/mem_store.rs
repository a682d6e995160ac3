use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::trace;

use super::reduce;
use super::CacheEntry;
use super::CacheEvent;
use super::Store;
use super::Subscription;
use crate::EqualityFn;
use crate::Projection;
use crate::Selection;

type EntryMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// In-memory [`Store`].
///
/// Clones share the same state.
#[derive(Clone)]
pub struct MemStore {
    entries: EntryMap,
    version_tx: Arc<watch::Sender<u64>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("len", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

impl MemStore {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            version_tx: Arc::new(version_tx),
        }
    }

    /// Number of notification cycles so far
    pub fn version(&self) -> u64 {
        *self.version_tx.borrow()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drops an entry outside of the event flow
    pub fn remove(
        &self,
        key: &str,
    ) -> Option<CacheEntry> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    fn apply(
        entries: &mut HashMap<String, CacheEntry>,
        event: &CacheEvent,
    ) {
        let key = event.key();
        match reduce(entries.get(key), event) {
            Some(next) => {
                entries.insert(key.to_string(), next);
            }
            None => {
                entries.remove(key);
            }
        }
        trace!(key = %key, event = event.name(), "applied cache event");
    }

    fn notify(&self) {
        self.version_tx.send_modify(|v| *v += 1);
    }
}

impl Store for MemStore {
    fn dispatch(
        &self,
        event: CacheEvent,
    ) {
        {
            let mut entries = self.entries.write();
            Self::apply(&mut entries, &event);
        }
        self.notify();
    }

    fn dispatch_batch(
        &self,
        events: Vec<CacheEvent>,
    ) {
        if events.is_empty() {
            return;
        }
        {
            let mut entries = self.entries.write();
            for event in &events {
                Self::apply(&mut entries, event);
            }
        }
        self.notify();
    }

    fn get_state(
        &self,
        key: &str,
    ) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    fn subscribe(
        &self,
        selection: Selection,
        equality: EqualityFn,
    ) -> Subscription {
        let entries = self.entries.clone();
        let reader_selection = selection.clone();
        let read = Box::new(move || {
            let guard = entries.read();
            Projection::select(guard.get(&reader_selection.key), &reader_selection.fields)
        });
        Subscription::new(selection, self.version_tx.subscribe(), read, equality)
    }
}
