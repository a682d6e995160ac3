//! Observer binding: projections of one cache entry and re-notification rules.
//!
//! `data` and `data_timestamp` are always part of a projection; everything
//! else must be requested through [`StateField`].

mod binding;

pub use binding::*;


use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::CacheEntry;
use crate::Error;
use crate::InFlightSet;
use crate::Result;

/// Optional entry fields an observer may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateField {
    Error,
    ErrorTimestamp,
    FetchStartedAt,
    GoodFetchOrdinal,
    InFlight,
}

impl StateField {
    pub const ALL: [StateField; 5] = [
        StateField::Error,
        StateField::ErrorTimestamp,
        StateField::FetchStartedAt,
        StateField::GoodFetchOrdinal,
        StateField::InFlight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::Error => "error",
            StateField::ErrorTimestamp => "errorTimestamp",
            StateField::FetchStartedAt => "fetchStartedAt",
            StateField::GoodFetchOrdinal => "goodFetchOrdinal",
            StateField::InFlight => "inFlight",
        }
    }
}

impl FromStr for StateField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(StateField::Error),
            "errorTimestamp" | "error_timestamp" => Ok(StateField::ErrorTimestamp),
            "fetchStartedAt" | "fetch_started_at" => Ok(StateField::FetchStartedAt),
            "goodFetchOrdinal" | "good_fetch_ordinal" => Ok(StateField::GoodFetchOrdinal),
            "inFlight" | "in_flight" => Ok(StateField::InFlight),
            other => Err(Error::InvalidConfig(format!("unknown state field: {other}"))),
        }
    }
}

/// Parses a list of field names, rejecting unknown ones
pub fn parse_fields<I, S>(names: I) -> Result<BTreeSet<StateField>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().parse()).collect()
}

/// Which entry (by store key) and which optional fields to observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub key: String,
    pub fields: BTreeSet<StateField>,
}

impl Selection {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeSet::new(),
        }
    }

    pub fn with_fields(
        mut self,
        fields: impl IntoIterator<Item = StateField>,
    ) -> Self {
        self.fields.extend(fields);
        self
    }
}

/// Observer-facing view of one entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub data: Option<Value>,
    pub data_timestamp: Option<u64>,
    pub error: Option<Value>,
    pub error_timestamp: Option<u64>,
    pub fetch_started_at: Option<u64>,
    pub good_fetch_ordinal: Option<u64>,
    pub in_flight: Option<InFlightSet>,
}

impl Projection {
    pub fn select(
        entry: Option<&CacheEntry>,
        fields: &BTreeSet<StateField>,
    ) -> Self {
        let Some(entry) = entry else {
            return Self::default();
        };
        let mut projection = Self {
            data: entry.data.clone(),
            data_timestamp: entry.data_timestamp,
            ..Self::default()
        };
        for field in fields {
            match field {
                StateField::Error => projection.error = entry.error.clone(),
                StateField::ErrorTimestamp => projection.error_timestamp = entry.error_timestamp,
                StateField::FetchStartedAt => projection.fetch_started_at = entry.fetch_started_at,
                StateField::GoodFetchOrdinal => {
                    projection.good_fetch_ordinal = entry.good_fetch_ordinal
                }
                StateField::InFlight => projection.in_flight = Some(entry.in_flight.clone()),
            }
        }
        projection
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.as_ref().map_or(0, |set| set.len())
    }
}

/// Decides whether two projections are equal (no re-notification)
pub type EqualityFn = Arc<dyn Fn(&Projection, &Projection) -> bool + Send + Sync>;

/// Default equality. "Shallow" refers to `in_flight` only: it is compared by
/// `Arc` identity, which is sound because in-flight sets are copy-on-write.
/// `data`, `error` and the scalar fields are still compared by value, so a
/// structurally equal `Value` counts as unchanged.
pub fn shallow_equal(
    a: &Projection,
    b: &Projection,
) -> bool {
    let in_flight_same = match (&a.in_flight, &b.in_flight) {
        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
        (None, None) => true,
        _ => false,
    };
    in_flight_same
        && a.data == b.data
        && a.data_timestamp == b.data_timestamp
        && a.error == b.error
        && a.error_timestamp == b.error_timestamp
        && a.fetch_started_at == b.fetch_started_at
        && a.good_fetch_ordinal == b.good_fetch_ordinal
}

/// Structural comparison of every field
pub fn deep_equal(
    a: &Projection,
    b: &Projection,
) -> bool {
    a == b
}

/// Configurable default equality.
///
/// The two kinds differ only in how `in_flight` is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityKind {
    #[default]
    Shallow,
    Deep,
}

impl EqualityKind {
    pub fn to_fn(self) -> EqualityFn {
        match self {
            EqualityKind::Shallow => Arc::new(shallow_equal),
            EqualityKind::Deep => Arc::new(deep_equal),
        }
    }
}
