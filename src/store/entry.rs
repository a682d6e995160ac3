use std::sync::Arc;

use serde_json::Value;

/// One outstanding request for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightRequest {
    /// `"{start_ordinal}-{counter}"`, unique within the key's in-flight set
    pub id: String,
    pub start_ordinal: u64,
}

/// Ordered set of outstanding requests.
///
/// Never mutated in place: every change produces a new `Arc`, so observers
/// can detect changes with `Arc::ptr_eq`.
pub type InFlightSet = Arc<Vec<InFlightRequest>>;

/// Cached state of one key.
///
/// Timestamps are wall-clock milliseconds since the Unix epoch; ordinals come
/// from the registry's monotonic clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Last successfully classified data
    pub data: Option<Value>,
    pub data_timestamp: Option<u64>,

    pub error: Option<Value>,
    pub error_timestamp: Option<u64>,

    /// Start time of the most recent fetch (informational)
    pub fetch_started_at: Option<u64>,

    /// Ordinal of the fetch whose result last updated `data`
    pub good_fetch_ordinal: Option<u64>,

    pub in_flight: InFlightSet,
}

impl CacheEntry {
    /// True when a write from `fetch_ordinal` would clobber newer data
    pub fn is_stale_write(
        &self,
        fetch_ordinal: u64,
    ) -> bool {
        self.good_fetch_ordinal
            .map(|good| fetch_ordinal < good)
            .unwrap_or(false)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}
