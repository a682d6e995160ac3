// -
// Configuration sources

/// Environment variable naming an optional config file
pub(crate) const CONFIG_PATH_ENV: &str = "FETCH_CACHE_CONFIG";

/// Prefix for environment overrides, e.g. `FETCH_CACHE__QUERY__DEDUPE=true`
pub(crate) const CONFIG_ENV_PREFIX: &str = "FETCH_CACHE";
pub(crate) const CONFIG_ENV_SEPARATOR: &str = "__";

// -
// Query defaults

pub(crate) const DEFAULT_DEDUPE_WINDOW_MS: u64 = 2000;

/// Reserved property a fetcher includes to opt into envelope classification
pub(crate) const DEFAULT_PAYLOAD_FIELD: &str = "data";

// -
// Polling

pub(crate) const DEFAULT_MIN_POLL_INTERVAL_MS: u64 = 100;

/// Generation value meaning "this subscription is cancelled"
pub(crate) const CANCELLED_GENERATION: u64 = 0;
