//! Fetch orchestration: in-flight registry, result classification,
//! reconciliation into store events, and polling.
//!
//! Data flow for one `query` call:
//!
//! ```text
//! begin_fetch ──deduped──▶ return None (no store event)
//!      │
//!      ▼
//! FetchStarted ──▶ fetcher().await ──▶ end_fetch
//!                                         │
//!                     ┌───────────────────┴──────────────────┐
//!                 rejected                                resolved
//!                     │                                      │
//!                  Errored                        classify ──▶ reconcile
//!                                                            │
//!                                                   dispatch_batch(events)
//! ```

mod classify;
mod poll;
mod query;
mod reconcile;
mod registry;

pub use classify::*;
pub use poll::*;
pub use query::*;
pub use reconcile::*;
pub use registry::*;
