use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_DEDUPE_WINDOW_MS;
use crate::constants::DEFAULT_PAYLOAD_FIELD;
use crate::Error;
use crate::MergeFn;
use crate::Result;

/// Ambient defaults for `query`, overridable per call via [`QueryOptions`]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryDefaults {
    /// Collapse bursts of calls for the same key into the earliest one
    #[serde(default)]
    pub dedupe: bool,

    /// Dedup window (unit: milliseconds)
    #[serde(default = "default_dedupe_window_ms")]
    pub dedupe_window_ms: u64,

    /// Swallow fetcher rejections instead of returning them to the caller.
    /// The rejection is recorded in the cache either way.
    #[serde(default = "default_catch_error")]
    pub catch_error: bool,

    /// Let responses of older fetches overwrite data written by newer ones
    #[serde(default)]
    pub save_stale_response: bool,

    /// Reserved property name used by envelope classification
    #[serde(default = "default_payload_field")]
    pub payload_field: String,

    /// Optional key namespace; keys become `"{namespace}/{key}"`
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            dedupe: false,
            dedupe_window_ms: default_dedupe_window_ms(),
            catch_error: default_catch_error(),
            save_stale_response: false,
            payload_field: default_payload_field(),
            namespace: None,
        }
    }
}

impl QueryDefaults {
    pub fn validate(&self) -> Result<()> {
        if self.payload_field.is_empty() {
            return Err(Error::InvalidConfig("query.payload_field cannot be empty".into()));
        }
        if let Some(ns) = &self.namespace {
            if ns.is_empty() {
                return Err(Error::InvalidConfig(
                    "query.namespace cannot be an empty string".into(),
                ));
            }
        }
        Ok(())
    }

    /// Applies the namespace prefix (if any) to a caller supplied key
    pub fn scoped_key(
        &self,
        key: &str,
    ) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{key}"),
            None => key.to_string(),
        }
    }
}

fn default_dedupe_window_ms() -> u64 {
    DEFAULT_DEDUPE_WINDOW_MS
}
fn default_catch_error() -> bool {
    true
}
fn default_payload_field() -> String {
    DEFAULT_PAYLOAD_FIELD.to_string()
}

/// Per-call overrides. Unset fields fall back to the ambient [`QueryDefaults`].
#[derive(Clone, Default)]
pub struct QueryOptions {
    pub dedupe: Option<bool>,
    pub dedupe_window_ms: Option<u64>,
    pub catch_error: Option<bool>,
    pub save_stale_response: Option<bool>,
    pub merge: Option<MergeFn>,
}

impl Debug for QueryOptions {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("dedupe", &self.dedupe)
            .field("dedupe_window_ms", &self.dedupe_window_ms)
            .field("catch_error", &self.catch_error)
            .field("save_stale_response", &self.save_stale_response)
            .field("merge", &self.merge.is_some())
            .finish()
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dedupe(
        mut self,
        window_ms: u64,
    ) -> Self {
        self.dedupe = Some(true);
        self.dedupe_window_ms = Some(window_ms);
        self
    }

    pub fn catch_error(
        mut self,
        catch: bool,
    ) -> Self {
        self.catch_error = Some(catch);
        self
    }

    pub fn save_stale_response(
        mut self,
        save: bool,
    ) -> Self {
        self.save_stale_response = Some(save);
        self
    }

    pub fn merge(
        mut self,
        merge: MergeFn,
    ) -> Self {
        self.merge = Some(merge);
        self
    }

    /// Merges these overrides on top of the ambient defaults
    pub fn resolve(
        &self,
        defaults: &QueryDefaults,
    ) -> ResolvedOptions {
        ResolvedOptions {
            dedupe: self.dedupe.unwrap_or(defaults.dedupe),
            dedupe_window_ms: self.dedupe_window_ms.unwrap_or(defaults.dedupe_window_ms),
            catch_error: self.catch_error.unwrap_or(defaults.catch_error),
            save_stale_response: self
                .save_stale_response
                .unwrap_or(defaults.save_stale_response),
            payload_field: defaults.payload_field.clone(),
            merge: self.merge.clone(),
        }
    }
}

/// Effective options of one `query` call
#[derive(Clone)]
pub struct ResolvedOptions {
    pub dedupe: bool,
    pub dedupe_window_ms: u64,
    pub catch_error: bool,
    pub save_stale_response: bool,
    pub payload_field: String,
    pub merge: Option<MergeFn>,
}
