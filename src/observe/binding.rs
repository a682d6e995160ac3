use std::collections::BTreeSet;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use super::EqualityFn;
use super::Projection;
use super::Selection;
use super::StateField;
use crate::Error;
use crate::PollScheduler;
use crate::QueryClient;
use crate::QueryOptions;
use crate::Result;
use crate::SharedFetcher;
use crate::Subscription;

/// How a [`QueryBinding`] fetches and what it exposes
#[derive(Clone, Default)]
pub struct BindingOptions {
    /// Poll at this interval; `None` fetches once per key
    pub interval: Option<Duration>,
    /// Optional fields exposed next to `data`/`data_timestamp`
    pub fields: BTreeSet<StateField>,
    /// Overrides the configured default equality
    pub equality: Option<EqualityFn>,
    pub query: QueryOptions,
}

impl std::fmt::Debug for BindingOptions {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BindingOptions")
            .field("interval", &self.interval)
            .field("fields", &self.fields)
            .field("equality", &self.equality.is_some())
            .field("query", &self.query)
            .finish()
    }
}

/// Binds one cache key to an observer.
///
/// On bind, and whenever the key or interval changes, it triggers a fetch
/// (one-shot) or (re)starts polling under a new generation. Unbinding or
/// dropping the binding cancels polling; a fetch already running still
/// completes and is written to the cache.
pub struct QueryBinding {
    client: QueryClient,
    fetcher: SharedFetcher,
    options: BindingOptions,
    key: String,
    poller: PollScheduler,
    subscription: Subscription,
}

impl std::fmt::Debug for QueryBinding {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("QueryBinding")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("poller", &self.poller)
            .finish()
    }
}

impl QueryBinding {
    /// Subscribes to `key` and triggers the first fetch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        client: QueryClient,
        key: &str,
        fetcher: SharedFetcher,
        options: BindingOptions,
    ) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        let subscription = subscribe(&client, key, &options);
        let binding = Self {
            client,
            fetcher,
            options,
            key: key.to_string(),
            poller: PollScheduler::new(),
            subscription,
        };
        binding.trigger()?;
        Ok(binding)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn interval(&self) -> Option<Duration> {
        self.options.interval
    }

    /// Current projection of the bound entry
    pub fn projection(&self) -> &Projection {
        self.subscription.current()
    }

    /// Waits for the next projection change; `None` once the store is gone
    pub async fn changed(&mut self) -> Option<Projection> {
        self.subscription.changed().await
    }

    /// Generation of the live poll loop (`0` when not polling)
    pub fn poll_generation(&self) -> u64 {
        self.poller.generation()
    }

    pub fn set_key(
        &mut self,
        key: &str,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        if key == self.key {
            return Ok(());
        }
        debug!(from = %self.key, to = %key, "binding key changed");
        self.key = key.to_string();
        self.subscription = subscribe(&self.client, key, &self.options);
        self.trigger()
    }

    pub fn set_interval(
        &mut self,
        interval: Option<Duration>,
    ) -> Result<()> {
        if interval == self.options.interval {
            return Ok(());
        }
        // Validate before mutating options
        if let Some(interval) = interval {
            self.client.config().polling.check_interval(interval)?;
        }
        debug!(key = %self.key, ?interval, "binding interval changed");
        self.options.interval = interval;
        self.trigger()
    }

    pub fn unbind(self) {
        self.poller.cancel();
    }

    fn trigger(&self) -> Result<()> {
        match self.options.interval {
            Some(interval) => {
                self.poller.start(
                    self.client.clone(),
                    &self.key,
                    self.fetcher.clone(),
                    interval,
                    self.options.query.clone(),
                )?;
            }
            None => {
                self.poller.cancel();
                let client = self.client.clone();
                let key = self.key.clone();
                let fetcher = self.fetcher.clone();
                let options = self.options.query.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.query(&key, move || fetcher(), &options).await {
                        warn!(key = %key, error = %e, "bound query failed");
                    }
                });
            }
        }
        Ok(())
    }
}

impl Drop for QueryBinding {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}

fn subscribe(
    client: &QueryClient,
    key: &str,
    options: &BindingOptions,
) -> Subscription {
    let equality = options
        .equality
        .clone()
        .unwrap_or_else(|| client.config().observe.equality.to_fn());
    let selection = Selection::new(client.scoped_key(key)).with_fields(options.fields.iter().copied());
    client.store().subscribe(selection, equality)
}
