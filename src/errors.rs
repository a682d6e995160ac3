//! Error hierarchy for the fetch cache
//!
//! Only two kinds of failure ever reach a caller: configuration problems and
//! fetcher rejections that were explicitly not caught (`catch_error = false`).
//! Deduped calls and stale writes are not errors and never show up here.

use config::ConfigError;
use serde_json::json;
use serde_json::Value;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration loaded but failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Cache keys must be non-empty
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Fetcher rejection re-thrown to the caller
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Rejection produced by a fetcher.
///
/// The value written to `CacheEntry::error` is [`FetchError::to_value`]: the
/// `detail` payload when the fetcher supplied one, otherwise an object holding
/// the message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("fetch failed: {message}")]
pub struct FetchError {
    pub message: String,
    pub detail: Option<Value>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a structured payload, e.g. the decoded body of a failed response.
    pub fn with_detail(
        mut self,
        detail: Value,
    ) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn to_value(&self) -> Value {
        match &self.detail {
            Some(detail) => detail.clone(),
            None => json!({ "message": self.message }),
        }
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
