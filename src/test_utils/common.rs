use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::fetcher;
use crate::CacheConfig;
use crate::FetchError;
use crate::MemStore;
use crate::QueryClient;
use crate::SharedFetcher;

pub type FetchResult = std::result::Result<Value, FetchError>;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

pub fn mem_client() -> (Arc<MemStore>, QueryClient) {
    mem_client_with(CacheConfig::default())
}

pub fn mem_client_with(config: CacheConfig) -> (Arc<MemStore>, QueryClient) {
    enable_logger();
    let store = Arc::new(MemStore::new());
    let client = QueryClient::new(store.clone(), config).expect("valid config");
    (store, client)
}

/// Resolves immediately with `value`; counts invocations
pub fn counting_fetcher(value: Value) -> (SharedFetcher, Arc<AtomicUsize>) {
    scripted_fetcher(vec![(Duration::ZERO, Ok(value))])
}

/// Resolves with `value` after `delay`
pub fn delayed_fetcher(
    value: Value,
    delay: Duration,
) -> (SharedFetcher, Arc<AtomicUsize>) {
    scripted_fetcher(vec![(delay, Ok(value))])
}

pub fn failing_fetcher(message: &str) -> (SharedFetcher, Arc<AtomicUsize>) {
    scripted_fetcher(vec![(Duration::ZERO, Err(FetchError::new(message)))])
}

/// The n-th invocation plays the n-th script step; the last step repeats.
pub fn scripted_fetcher(script: Vec<(Duration, FetchResult)>) -> (SharedFetcher, Arc<AtomicUsize>) {
    assert!(!script.is_empty(), "script needs at least one step");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let script = Arc::new(script);
    let f = fetcher(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = script[n.min(script.len() - 1)].clone();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    });
    (f, calls)
}
