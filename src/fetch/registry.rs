//! Process-wide bookkeeping of outstanding fetches.
//!
//! The registry keeps its own copy of each key's in-flight set so that dedup
//! and id allocation never depend on store reads. Entries are not removed
//! when the last request settles: `last_start_ordinal` must survive for the
//! dedup window.
//!
//! Callers that mirror the in-flight set elsewhere (the store) publish it
//! through the `*_with` variants, whose callbacks run under the per-key lock.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use crate::time::OrdinalClock;
use crate::InFlightRequest;
use crate::InFlightSet;

#[derive(Debug, Clone)]
struct RegistryEntry {
    last_start_ordinal: u64,
    in_flight: InFlightSet,
}

/// Reservation handed out by [`InFlightRegistry::begin_fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub request_id: String,
    pub start_ordinal: u64,
    /// Fresh copy of the in-flight set, including this request
    pub in_flight: InFlightSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginFetch {
    /// Another fetch for this key started within the dedup window
    Deduped,
    Proceed(FetchTicket),
}

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: DashMap<String, RegistryEntry>,
    clock: OrdinalClock,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current monotonic ordinal
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Reserves a request slot for `key`, or reports that the call is deduped.
    ///
    /// The deduped path performs no mutation.
    pub fn begin_fetch(
        &self,
        key: &str,
        dedupe: bool,
        dedupe_window_ms: u64,
    ) -> BeginFetch {
        self.begin_fetch_with(key, dedupe, dedupe_window_ms, |_| {})
    }

    /// Like [`begin_fetch`](Self::begin_fetch), but runs `on_reserved` while
    /// the key's entry is still locked. Publishing the new in-flight set from
    /// inside the callback keeps every copy of it in registry order.
    ///
    /// `on_reserved` must not call back into the registry.
    pub fn begin_fetch_with<F>(
        &self,
        key: &str,
        dedupe: bool,
        dedupe_window_ms: u64,
        on_reserved: F,
    ) -> BeginFetch
    where
        F: FnOnce(&FetchTicket),
    {
        let now = self.clock.now();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if dedupe && now.saturating_sub(entry.last_start_ordinal) <= dedupe_window_ms {
                    trace!(key, now, last_start = entry.last_start_ordinal, "fetch deduped");
                    return BeginFetch::Deduped;
                }
                let ticket = reserve(&entry.in_flight, now);
                entry.last_start_ordinal = now;
                entry.in_flight = ticket.in_flight.clone();
                trace!(key, request_id = %ticket.request_id, "fetch reserved");
                on_reserved(&ticket);
                BeginFetch::Proceed(ticket)
            }
            Entry::Vacant(vacant) => {
                let ticket = reserve(&[], now);
                let _locked = vacant.insert(RegistryEntry {
                    last_start_ordinal: now,
                    in_flight: ticket.in_flight.clone(),
                });
                trace!(key, request_id = %ticket.request_id, "fetch reserved");
                on_reserved(&ticket);
                BeginFetch::Proceed(ticket)
            }
        }
    }

    /// Removes `request_id` from the key's in-flight set and returns a fresh
    /// copy of what remains. Unknown ids are ignored.
    pub fn end_fetch(
        &self,
        key: &str,
        request_id: &str,
    ) -> InFlightSet {
        self.end_fetch_with(key, request_id, |_| {})
    }

    /// Like [`end_fetch`](Self::end_fetch), but runs `on_settled` with the
    /// remaining set while the key's entry is still locked.
    ///
    /// `on_settled` must not call back into the registry.
    pub fn end_fetch_with<F>(
        &self,
        key: &str,
        request_id: &str,
        on_settled: F,
    ) -> InFlightSet
    where
        F: FnOnce(&InFlightSet),
    {
        let Some(mut entry) = self.entries.get_mut(key) else {
            let empty = InFlightSet::default();
            on_settled(&empty);
            return empty;
        };
        let remaining: Vec<InFlightRequest> = entry
            .in_flight
            .iter()
            .filter(|r| r.id != request_id)
            .cloned()
            .collect();
        entry.in_flight = Arc::new(remaining);
        trace!(key, request_id, remaining = entry.in_flight.len(), "fetch ended");
        on_settled(&entry.in_flight);
        entry.in_flight.clone()
    }

    pub fn in_flight(
        &self,
        key: &str,
    ) -> InFlightSet {
        self.entries
            .get(key)
            .map(|e| e.in_flight.clone())
            .unwrap_or_default()
    }

    pub fn last_start_ordinal(
        &self,
        key: &str,
    ) -> Option<u64> {
        self.entries.get(key).map(|e| e.last_start_ordinal)
    }
}

fn reserve(
    in_flight: &[InFlightRequest],
    start_ordinal: u64,
) -> FetchTicket {
    let request_id = next_request_id(in_flight, start_ordinal);
    let mut next = Vec::with_capacity(in_flight.len() + 1);
    next.extend_from_slice(in_flight);
    next.push(InFlightRequest {
        id: request_id.clone(),
        start_ordinal,
    });
    FetchTicket {
        request_id,
        start_ordinal,
        in_flight: Arc::new(next),
    }
}

/// `"{ordinal}-{counter}"` with the smallest counter not already in use.
/// Same-millisecond starts share an ordinal, hence the counter.
pub(crate) fn next_request_id(
    in_flight: &[InFlightRequest],
    start_ordinal: u64,
) -> String {
    let mut counter = 0u64;
    loop {
        let candidate = format!("{start_ordinal}-{counter}");
        if !in_flight.iter().any(|r| r.id == candidate) {
            return candidate;
        }
        counter += 1;
    }
}
