//! Store mutation events and the reducer that applies them.
//!
//! Every change to a [`CacheEntry`] goes through [`reduce`]. The staleness
//! guard lives here because it needs the entry's current
//! `good_fetch_ordinal`, which the fetch path never reads directly.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::CacheEntry;
use super::InFlightSet;

/// Result of a caller supplied merge function
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Store this value as the entry's new `data`
    Replace(Value),
    /// Leave `data` unchanged
    Keep,
    /// Tombstone: remove the whole entry from the store
    Remove,
}

/// `(previous data, new data) -> outcome`.
///
/// Runs inside the store's write section and must not call back into the store.
pub type MergeFn = Arc<dyn Fn(Option<&Value>, &Value) -> MergeOutcome + Send + Sync>;

/// Wraps a closure into a [`MergeFn`]
pub fn merge_fn<F>(f: F) -> MergeFn
where
    F: Fn(Option<&Value>, &Value) -> MergeOutcome + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub enum CacheEvent {
    /// A request was reserved in the registry
    FetchStarted {
        key: String,
        fetch_started_at: u64,
        in_flight: InFlightSet,
    },

    /// A request finished without touching `data`/`error`
    FetchSettled { key: String, in_flight: InFlightSet },

    /// Fetcher rejection or classified error. Always applied.
    Errored {
        key: String,
        error: Value,
        error_timestamp: u64,
        in_flight: InFlightSet,
    },

    /// Whole-value replacement of `data`
    DataReceived {
        key: String,
        data: Value,
        data_timestamp: u64,
        fetch_ordinal: u64,
        save_stale: bool,
        in_flight: InFlightSet,
    },

    /// Bookkeeping half of a merge write
    DataBookkeeping {
        key: String,
        data_timestamp: u64,
        fetch_ordinal: u64,
        save_stale: bool,
        in_flight: InFlightSet,
    },

    /// Data half of a merge write; combined with the entry's current `data`
    DataMerged {
        key: String,
        data: Value,
        fetch_ordinal: u64,
        save_stale: bool,
        merge: MergeFn,
    },
}

impl CacheEvent {
    pub fn key(&self) -> &str {
        match self {
            CacheEvent::FetchStarted { key, .. }
            | CacheEvent::FetchSettled { key, .. }
            | CacheEvent::Errored { key, .. }
            | CacheEvent::DataReceived { key, .. }
            | CacheEvent::DataBookkeeping { key, .. }
            | CacheEvent::DataMerged { key, .. } => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::FetchStarted { .. } => "fetch_started",
            CacheEvent::FetchSettled { .. } => "fetch_settled",
            CacheEvent::Errored { .. } => "errored",
            CacheEvent::DataReceived { .. } => "data_received",
            CacheEvent::DataBookkeeping { .. } => "data_bookkeeping",
            CacheEvent::DataMerged { .. } => "data_merged",
        }
    }
}

impl Debug for CacheEvent {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheEvent")
            .field("name", &self.name())
            .field("key", &self.key())
            .finish()
    }
}

/// Computes the next entry for `event.key()`. `None` removes the entry.
pub fn reduce(
    current: Option<&CacheEntry>,
    event: &CacheEvent,
) -> Option<CacheEntry> {
    let mut next = current.cloned().unwrap_or_default();

    match event {
        CacheEvent::FetchStarted {
            fetch_started_at,
            in_flight,
            ..
        } => {
            next.fetch_started_at = Some(*fetch_started_at);
            next.in_flight = in_flight.clone();
        }
        CacheEvent::FetchSettled { in_flight, .. } => {
            next.in_flight = in_flight.clone();
        }
        CacheEvent::Errored {
            error,
            error_timestamp,
            in_flight,
            ..
        } => {
            next.error = Some(error.clone());
            next.error_timestamp = Some(*error_timestamp);
            next.in_flight = in_flight.clone();
        }
        CacheEvent::DataReceived {
            key,
            data,
            data_timestamp,
            fetch_ordinal,
            save_stale,
            in_flight,
        } => {
            next.in_flight = in_flight.clone();
            if suppress_stale(key, &next, *fetch_ordinal, *save_stale) {
                return Some(next);
            }
            next.data = Some(data.clone());
            next.data_timestamp = Some(*data_timestamp);
            next.good_fetch_ordinal = Some(advance_ordinal(&next, *fetch_ordinal));
        }
        CacheEvent::DataBookkeeping {
            key,
            data_timestamp,
            fetch_ordinal,
            save_stale,
            in_flight,
        } => {
            next.in_flight = in_flight.clone();
            if suppress_stale(key, &next, *fetch_ordinal, *save_stale) {
                return Some(next);
            }
            next.data_timestamp = Some(*data_timestamp);
            next.good_fetch_ordinal = Some(advance_ordinal(&next, *fetch_ordinal));
        }
        CacheEvent::DataMerged {
            key,
            data,
            fetch_ordinal,
            save_stale,
            merge,
        } => {
            if suppress_stale(key, &next, *fetch_ordinal, *save_stale) {
                return current.cloned();
            }
            match merge(next.data.as_ref(), data) {
                MergeOutcome::Replace(value) => next.data = Some(value),
                MergeOutcome::Keep => {}
                MergeOutcome::Remove => {
                    debug!(key = %key, "merge returned tombstone, removing entry");
                    return None;
                }
            }
        }
    }

    Some(next)
}

fn suppress_stale(
    key: &str,
    entry: &CacheEntry,
    fetch_ordinal: u64,
    save_stale: bool,
) -> bool {
    if save_stale || !entry.is_stale_write(fetch_ordinal) {
        return false;
    }
    debug!(
        key = %key,
        fetch_ordinal,
        good_fetch_ordinal = ?entry.good_fetch_ordinal,
        "suppressing stale write"
    );
    true
}

// A forced stale write must not move the ordinal backwards.
fn advance_ordinal(
    entry: &CacheEntry,
    fetch_ordinal: u64,
) -> u64 {
    entry
        .good_fetch_ordinal
        .map_or(fetch_ordinal, |good| good.max(fetch_ordinal))
}
