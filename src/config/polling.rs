use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MIN_POLL_INTERVAL_MS;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PollingConfig {
    /// Shortest interval a poll loop may be started with (unit: milliseconds)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_ms == 0 {
            return Err(Error::InvalidConfig("polling.min_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Rejects intervals below `min_interval_ms`
    pub(crate) fn check_interval(
        &self,
        interval: Duration,
    ) -> Result<()> {
        if interval < Duration::from_millis(self.min_interval_ms) {
            return Err(Error::InvalidConfig(format!(
                "polling interval {:?} is below the minimum of {}ms",
                interval, self.min_interval_ms
            )));
        }
        Ok(())
    }
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_POLL_INTERVAL_MS
}
