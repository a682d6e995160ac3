//! Keyed cache store.
//!
//! The fetch path only ever *writes* to the store through [`Store::dispatch`]
//! and [`Store::dispatch_batch`]; reads happen on the observer side through
//! [`Store::subscribe`]. Each dispatch call (single or batch) produces at most
//! one notification cycle for subscribers.

mod entry;
mod event;
mod mem_store;

pub use entry::*;
pub use event::*;
pub use mem_store::*;


#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;

use crate::EqualityFn;
use crate::Projection;
use crate::Selection;

#[cfg_attr(test, automock)]
pub trait Store: Send + Sync + 'static {
    /// Applies one event and notifies subscribers
    fn dispatch(
        &self,
        event: CacheEvent,
    );

    /// Applies all events atomically, then notifies subscribers once
    fn dispatch_batch(
        &self,
        events: Vec<CacheEvent>,
    );

    /// Snapshot of one entry
    fn get_state(
        &self,
        key: &str,
    ) -> Option<CacheEntry>;

    /// Live projection of one entry, re-notified only when `equality` says the
    /// projection changed
    fn subscribe(
        &self,
        selection: Selection,
        equality: EqualityFn,
    ) -> Subscription;
}

type ProjectionReader = Box<dyn Fn() -> Projection + Send + Sync>;

/// Handle returned by [`Store::subscribe`]
pub struct Subscription {
    selection: Selection,
    version_rx: watch::Receiver<u64>,
    read: ProjectionReader,
    equality: EqualityFn,
    current: Projection,
}

impl std::fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("selection", &self.selection)
            .field("current", &self.current)
            .finish()
    }
}

impl Subscription {
    pub fn new(
        selection: Selection,
        mut version_rx: watch::Receiver<u64>,
        read: ProjectionReader,
        equality: EqualityFn,
    ) -> Self {
        version_rx.borrow_and_update();
        let current = read();
        Self {
            selection,
            version_rx,
            read,
            equality,
            current,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Latest selection seen by this subscription
    pub fn current(&self) -> &Projection {
        &self.current
    }

    /// Waits until the projection changes under the equality function.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Projection> {
        loop {
            if self.version_rx.changed().await.is_err() {
                return None;
            }
            let next = (self.read)();
            if !(self.equality)(&self.current, &next) {
                self.current = next.clone();
                return Some(next);
            }
        }
    }
}
