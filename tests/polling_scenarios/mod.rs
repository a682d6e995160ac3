use std::sync::atomic::Ordering;
use std::time::Duration;

use fetch_cache::QueryOptions;
use fetch_cache::Store;
use serde_json::json;
use tokio::time;

use crate::commons::instant_fetcher;
use crate::commons::slow_fetcher;
use crate::commons::TestContext;
use crate::commons::POLL_INTERVAL;

/// Cancelled after the first cycle: exactly one fetch, never another
#[tokio::test(start_paused = true)]
async fn test_cancel_after_first_cycle() {
    let ctx = TestContext::new();
    let (f, calls) = instant_fetcher(json!({ "status": "ok" }));

    let handle = ctx
        .client
        .start_polling("health", f, POLL_INTERVAL, QueryOptions::new())
        .unwrap();
    time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    time::sleep(POLL_INTERVAL * 10).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        ctx.store.get_state("health").unwrap().data,
        Some(json!({ "status": "ok" }))
    );
}

/// Cancelled while the first fetch is still running: it completes and is
/// written, then nothing else runs
#[tokio::test(start_paused = true)]
async fn test_cancel_during_fetch() {
    let ctx = TestContext::new();
    let (f, calls) = slow_fetcher(json!({ "status": "ok" }), Duration::from_millis(600));

    let handle = ctx
        .client
        .start_polling("health", f, POLL_INTERVAL, QueryOptions::new())
        .unwrap();
    time::sleep(Duration::from_millis(100)).await;
    handle.cancel();
    assert!(ctx.store.get_state("health").unwrap().data.is_none());

    time::sleep(POLL_INTERVAL * 10).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let entry = ctx.store.get_state("health").unwrap();
    assert_eq!(entry.data, Some(json!({ "status": "ok" })));
    assert!(entry.in_flight.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_independent_polls_per_key() {
    let ctx = TestContext::new();
    let (a, a_calls) = instant_fetcher(json!("a"));
    let (b, b_calls) = instant_fetcher(json!("b"));

    let a_handle = ctx
        .client
        .start_polling("a", a, POLL_INTERVAL, QueryOptions::new())
        .unwrap();
    let _b_handle = ctx
        .client
        .start_polling("b", b, POLL_INTERVAL * 2, QueryOptions::new())
        .unwrap();

    time::sleep(Duration::from_millis(4500)).await;
    a_handle.cancel();
    time::sleep(Duration::from_millis(2000)).await;

    // a: 0, 1000, 2000, 3000, 4000 ms
    assert_eq!(a_calls.load(Ordering::SeqCst), 5);
    // b: 0, 2000, 4000, 6000 ms
    assert_eq!(b_calls.load(Ordering::SeqCst), 4);
}
