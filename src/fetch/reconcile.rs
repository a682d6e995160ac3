//! Turns a classification into store events.
//!
//! With a merge function the write is split in two events, bookkeeping first,
//! then the data to merge. Both are dispatched as one batch so observers see
//! a single notification, and the merge function runs against whatever `data`
//! the store holds at apply time.

use serde_json::Value;

use super::Classification;
use crate::time::timestamp_millis;
use crate::CacheEvent;
use crate::InFlightSet;
use crate::ResolvedOptions;

pub fn reconcile(
    key: &str,
    classification: Classification,
    fetch_ordinal: u64,
    in_flight: InFlightSet,
    options: &ResolvedOptions,
) -> Vec<CacheEvent> {
    let key = key.to_string();
    let save_stale = options.save_stale_response;

    match classification {
        Classification::Discard => vec![CacheEvent::FetchSettled { key, in_flight }],
        Classification::Error(error) => vec![error_event(key, error, in_flight)],
        Classification::Data(data) => match &options.merge {
            None => vec![CacheEvent::DataReceived {
                key,
                data,
                data_timestamp: timestamp_millis(),
                fetch_ordinal,
                save_stale,
                in_flight,
            }],
            Some(merge) => vec![
                CacheEvent::DataBookkeeping {
                    key: key.clone(),
                    data_timestamp: timestamp_millis(),
                    fetch_ordinal,
                    save_stale,
                    in_flight,
                },
                CacheEvent::DataMerged {
                    key,
                    data,
                    fetch_ordinal,
                    save_stale,
                    merge: merge.clone(),
                },
            ],
        },
    }
}

pub fn error_event(
    key: String,
    error: Value,
    in_flight: InFlightSet,
) -> CacheEvent {
    CacheEvent::Errored {
        key,
        error,
        error_timestamp: timestamp_millis(),
        in_flight,
    }
}
