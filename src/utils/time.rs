use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tokio::time::Instant;

/// Wall-clock milliseconds since the Unix epoch
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Monotonic millisecond ordinal, measured from the clock's creation.
///
/// Backed by `tokio::time::Instant` so paused-time tests drive it with
/// `tokio::time::advance`.
#[derive(Debug, Clone, Copy)]
pub struct OrdinalClock {
    epoch: Instant,
}

impl Default for OrdinalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl OrdinalClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn now(&self) -> u64 {
        Instant::now().duration_since(self.epoch).as_millis() as u64
    }
}
