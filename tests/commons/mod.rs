use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use fetch_cache::fetcher;
use fetch_cache::CacheConfig;
use fetch_cache::FetchError;
use fetch_cache::MemStore;
use fetch_cache::QueryClient;
use fetch_cache::SharedFetcher;
use serde_json::Value;

// Default interval for polling scenarios
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub struct TestContext {
    pub store: Arc<MemStore>,
    pub client: QueryClient,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        crate::enable_logger();
        let store = Arc::new(MemStore::new());
        let client = QueryClient::new(store.clone(), config).expect("valid config");
        Self { store, client }
    }
}

/// Fetcher that answers `value` after `delay`, counting invocations
pub fn slow_fetcher(
    value: Value,
    delay: Duration,
) -> (SharedFetcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let f = fetcher(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok::<_, FetchError>(value)
        }
    });
    (f, calls)
}

pub fn instant_fetcher(value: Value) -> (SharedFetcher, Arc<AtomicUsize>) {
    slow_fetcher(value, Duration::ZERO)
}
