use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::classify;
use super::error_event;
use super::reconcile;
use super::BeginFetch;
use super::InFlightRegistry;
use super::PollHandle;
use super::PollScheduler;
use crate::time::timestamp_millis;
use crate::CacheConfig;
use crate::CacheEvent;
use crate::Error;
use crate::FetchError;
use crate::QueryOptions;
use crate::Result;
use crate::Store;

/// Reusable zero-argument fetcher, needed wherever a fetch runs more than once
pub type SharedFetcher = Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<Value, FetchError>> + Send + Sync>;

/// Wraps an async closure into a [`SharedFetcher`]
pub fn fetcher<F, Fut>(f: F) -> SharedFetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, FetchError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Entry point of the cache: dedup, in-flight accounting, classification and
/// reconciliation for every fetch.
///
/// Cheap to clone; clones share the registry, the store and the defaults.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryClientInner>,
}

struct QueryClientInner {
    store: Arc<dyn Store>,
    registry: InFlightRegistry,
    config: ArcSwap<CacheConfig>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("registry", &self.inner.registry)
            .field("config", &self.inner.config.load())
            .finish()
    }
}

impl QueryClient {
    /// Creates a client with its own in-flight registry.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `config` fails validation.
    pub fn new(
        store: Arc<dyn Store>,
        config: CacheConfig,
    ) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            inner: Arc::new(QueryClientInner {
                store,
                registry: InFlightRegistry::new(),
                config: ArcSwap::from_pointee(config),
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> Arc<CacheConfig> {
        self.inner.config.load_full()
    }

    /// Replaces the ambient defaults. Fetches already running keep the
    /// options they resolved at start.
    pub fn set_config(
        &self,
        config: CacheConfig,
    ) -> Result<()> {
        let config = config.validate()?;
        self.inner.config.store(Arc::new(config));
        Ok(())
    }

    /// Store key for a caller key (applies the configured namespace)
    pub fn scoped_key(
        &self,
        key: &str,
    ) -> String {
        self.inner.config.load().query.scoped_key(key)
    }

    /// Runs `fetcher` for `key` unless deduped, and reconciles its result
    /// into the store.
    ///
    /// Returns the raw fetcher result, or `None` when the call was deduped or
    /// a rejection was caught. The store always records a rejection, even
    /// when it is returned as `Err(Error::Fetch(_))` (`catch_error = false`).
    pub async fn query<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: &QueryOptions,
    ) -> Result<Option<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, FetchError>>,
    {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        let (key, resolved) = {
            let config = self.inner.config.load();
            (config.query.scoped_key(key), options.resolve(&config.query))
        };

        let store = &self.inner.store;
        let ticket = match self.inner.registry.begin_fetch_with(
            &key,
            resolved.dedupe,
            resolved.dedupe_window_ms,
            |ticket| {
                store.dispatch(CacheEvent::FetchStarted {
                    key: key.clone(),
                    fetch_started_at: timestamp_millis(),
                    in_flight: ticket.in_flight.clone(),
                })
            },
        ) {
            BeginFetch::Deduped => {
                debug!(key = %key, window_ms = resolved.dedupe_window_ms, "query deduped");
                return Ok(None);
            }
            BeginFetch::Proceed(ticket) => ticket,
        };

        let mut pending = PendingFetch {
            client: self,
            key: &key,
            request_id: &ticket.request_id,
            settled: false,
        };
        let outcome = fetcher().await;

        match outcome {
            Err(e) => {
                warn!(key = %key, request_id = %ticket.request_id, error = %e, "fetcher rejected");
                pending.settle(|in_flight| vec![error_event(key.clone(), e.to_value(), in_flight)]);
                if resolved.catch_error {
                    Ok(None)
                } else {
                    Err(Error::Fetch(e))
                }
            }
            Ok(raw) => {
                let classification = classify(&raw, &resolved.payload_field);
                pending.settle(|in_flight| {
                    reconcile(
                        &key,
                        classification,
                        ticket.start_ordinal,
                        in_flight,
                        &resolved,
                    )
                });
                Ok(Some(raw))
            }
        }
    }

    /// Polls `key` every `interval` until the returned handle is cancelled
    /// or dropped. The first fetch runs immediately.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` for an empty key and `Error::InvalidConfig`
    /// when `interval` is below `polling.min_interval_ms`.
    pub fn start_polling(
        &self,
        key: &str,
        fetcher: SharedFetcher,
        interval: Duration,
        options: QueryOptions,
    ) -> Result<PollHandle> {
        let scheduler = PollScheduler::new();
        scheduler.start(self.clone(), key, fetcher, interval, options)?;
        Ok(PollHandle::new(scheduler))
    }
}

/// Registry slot of one running fetch. Released by `settle`, or on drop if
/// the `query` future goes away mid-fetch.
struct PendingFetch<'a> {
    client: &'a QueryClient,
    key: &'a str,
    request_id: &'a str,
    settled: bool,
}

impl PendingFetch<'_> {
    /// Releases the slot and dispatches the events built from the remaining
    /// in-flight set, both under the registry's per-key lock.
    fn settle<F>(
        &mut self,
        events: F,
    ) where
        F: FnOnce(crate::InFlightSet) -> Vec<CacheEvent>,
    {
        self.settled = true;
        let store = &self.client.inner.store;
        self.client
            .inner
            .registry
            .end_fetch_with(self.key, self.request_id, |in_flight| {
                store.dispatch_batch(events(in_flight.clone()))
            });
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!(key = %self.key, request_id = %self.request_id, "query dropped before fetch completed");
        let store = &self.client.inner.store;
        let key = self.key;
        self.client
            .inner
            .registry
            .end_fetch_with(key, self.request_id, |in_flight| {
                store.dispatch(CacheEvent::FetchSettled {
                    key: key.to_string(),
                    in_flight: in_flight.clone(),
                })
            });
    }
}
