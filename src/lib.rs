//! Client-side request caching engine.
//!
//! Given a string key and an async fetcher, [`QueryClient::query`]:
//! - skips the fetch when another one for the same key started within the
//!   dedup window,
//! - tracks the request in the [`InFlightRegistry`],
//! - classifies the result into data, error or nothing ([`classify`]),
//! - reconciles it into the [`Store`], dropping responses that are older
//!   than the data already stored.
//!
//! Observers read the store through [`QueryBinding`] / [`Store::subscribe`]
//! and are notified only when the fields they selected change.
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//! use fetch_cache::{fetcher, CacheConfig, MemStore, QueryClient, QueryOptions, Store};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let store = Arc::new(MemStore::new());
//!     let client = QueryClient::new(store.clone(), CacheConfig::default()).unwrap();
//!
//!     let user = fetcher(|| async { Ok(json!({ "name": "Ann" })) });
//!     client.query("user", || user(), &QueryOptions::new()).await.unwrap();
//!
//!     let entry = store.get_state("user").unwrap();
//!     assert_eq!(entry.data, Some(json!({ "name": "Ann" })));
//! }
//! ```

mod config;
mod constants;
mod errors;
mod fetch;
mod observe;
mod store;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use fetch::*;
pub use observe::*;
pub use store::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
