//! Configuration management for the fetch cache.
//!
//! Ambient defaults are loaded hierarchically and merged with per-call
//! [`QueryOptions`](crate::QueryOptions), call-site values taking precedence:
//! 1. Default values from code
//! 2. Configuration file named by `FETCH_CACHE_CONFIG`
//! 3. Environment variables with `FETCH_CACHE__` prefix (highest priority)
mod observe;
mod polling;
mod query;
pub use observe::*;
pub use polling::*;
pub use query::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_ENV_SEPARATOR;
use crate::constants::CONFIG_PATH_ENV;
use crate::Result;

/// Top level configuration container
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CacheConfig {
    /// Defaults applied to every `query` call
    #[serde(default)]
    pub query: QueryDefaults,
    /// Polling scheduler limits
    #[serde(default)]
    pub polling: PollingConfig,
    /// Observer binding defaults
    #[serde(default)]
    pub observe: ObserveConfig,
}

impl CacheConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers should run [`validate()`](Self::validate) once all overrides
    /// are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("FETCH_CACHE__QUERY__DEDUPE", "true");
    /// let cfg = CacheConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.query.validate()?;
        self.polling.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator(CONFIG_ENV_SEPARATOR)
        .ignore_empty(true)
        .try_parsing(true)
}
