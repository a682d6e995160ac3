//! Polling scheduler.
//!
//! Each [`PollScheduler`] owns a generation counter. Starting a loop issues a
//! new generation; the loop captures it and exits as soon as the scheduler's
//! current generation differs. Cancellation stores the sentinel generation and
//! wakes a sleeping loop, but never interrupts a fetch that is already
//! running: that fetch completes and is reconciled, and the loop then exits.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use super::QueryClient;
use super::SharedFetcher;
use crate::constants::CANCELLED_GENERATION;
use crate::Error;
use crate::QueryOptions;
use crate::Result;

#[derive(Debug)]
pub struct PollScheduler {
    current: Arc<AtomicU64>,
    issued: AtomicU64,
    token: Mutex<Option<CancellationToken>>,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(CANCELLED_GENERATION)),
            issued: AtomicU64::new(CANCELLED_GENERATION),
            token: Mutex::new(None),
        }
    }

    /// Generation of the live loop, or `0` when idle or cancelled
    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.generation() != CANCELLED_GENERATION
    }

    /// Starts a loop for `key`, superseding any loop this scheduler started
    /// before. Returns the new generation.
    pub fn start(
        &self,
        client: QueryClient,
        key: &str,
        fetcher: SharedFetcher,
        interval: Duration,
        options: QueryOptions,
    ) -> Result<u64> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        client.config().polling.check_interval(interval)?;

        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.store(generation, Ordering::SeqCst);

        let token = CancellationToken::new();
        if let Some(previous) = self.token.lock().replace(token.clone()) {
            previous.cancel();
        }

        debug!(key, generation, ?interval, "starting poll loop");
        tokio::spawn(poll_loop(PollLoop {
            client,
            key: key.to_string(),
            fetcher,
            interval,
            options,
            generation,
            current: self.current.clone(),
            token,
        }));
        Ok(generation)
    }

    /// Stops the live loop after its current cycle. Idempotent.
    pub fn cancel(&self) {
        self.current.store(CANCELLED_GENERATION, Ordering::SeqCst);
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Returned by [`QueryClient::start_polling`]; dropping it cancels polling
#[derive(Debug)]
pub struct PollHandle {
    scheduler: PollScheduler,
}

impl PollHandle {
    pub(crate) fn new(scheduler: PollScheduler) -> Self {
        Self { scheduler }
    }

    pub fn cancel(&self) {
        self.scheduler.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.scheduler.is_active()
    }
}

struct PollLoop {
    client: QueryClient,
    key: String,
    fetcher: SharedFetcher,
    interval: Duration,
    options: QueryOptions,
    generation: u64,
    current: Arc<AtomicU64>,
    token: CancellationToken,
}

async fn poll_loop(state: PollLoop) {
    let PollLoop {
        client,
        key,
        fetcher,
        interval,
        options,
        generation,
        current,
        token,
    } = state;

    loop {
        if current.load(Ordering::SeqCst) != generation {
            debug!(key = %key, generation, "poll loop superseded, exiting");
            return;
        }

        let fetch = fetcher.clone();
        if let Err(e) = client.query(&key, move || fetch(), &options).await {
            // Already recorded in the cache; keep polling.
            warn!(key = %key, generation, error = %e, "poll cycle failed");
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(key = %key, generation, "poll loop cancelled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
