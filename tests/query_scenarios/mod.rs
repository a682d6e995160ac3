use std::sync::atomic::Ordering;
use std::time::Duration;

use fetch_cache::merge_fn;
use fetch_cache::CacheConfig;
use fetch_cache::Error;
use fetch_cache::FetchError;
use fetch_cache::MergeOutcome;
use fetch_cache::QueryOptions;
use fetch_cache::Store;
use serde_json::json;
use tokio::time;

use crate::commons::instant_fetcher;
use crate::commons::slow_fetcher;
use crate::commons::TestContext;

#[tokio::test(start_paused = true)]
async fn test_user_profile_is_cached() {
    let ctx = TestContext::new();
    let (user, calls) = instant_fetcher(json!({ "name": "Ann" }));

    let raw = ctx
        .client
        .query("user", || user(), &QueryOptions::new())
        .await
        .unwrap();

    assert_eq!(raw, Some(json!({ "name": "Ann" })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let entry = ctx.store.get_state("user").unwrap();
    assert_eq!(entry.data, Some(json!({ "name": "Ann" })));
    assert!(entry.data_timestamp.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_calls_is_deduped() {
    let ctx = TestContext::new();
    let (user, calls) = instant_fetcher(json!({ "name": "Ann" }));
    let options = QueryOptions::new().dedupe(2000);

    ctx.client.query("user", || user(), &options).await.unwrap();
    time::advance(Duration::from_millis(500)).await;
    let second = ctx.client.query("user", || user(), &options).await.unwrap();

    assert_eq!(second, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dedupe_is_per_key() {
    let ctx = TestContext::new();
    let (f, calls) = instant_fetcher(json!(1));
    let options = QueryOptions::new().dedupe(2000);

    ctx.client.query("a", || f(), &options).await.unwrap();
    ctx.client.query("b", || f(), &options).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_responses_keep_newest_data() {
    let ctx = TestContext::new();
    let (older, _) = slow_fetcher(json!({ "page": 1 }), Duration::from_millis(400));
    let (newer, _) = slow_fetcher(json!({ "page": 2 }), Duration::from_millis(20));
    let options = QueryOptions::new();

    let client = ctx.client.clone();
    let first = tokio::spawn(async move { client.query("list", || older(), &QueryOptions::new()).await });
    time::sleep(Duration::from_millis(50)).await;
    ctx.client.query("list", || newer(), &options).await.unwrap();
    first.await.unwrap().unwrap();

    let entry = ctx.store.get_state("list").unwrap();
    assert_eq!(entry.data, Some(json!({ "page": 2 })));
    assert!(entry.in_flight.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_last_good_data() {
    let ctx = TestContext::new();
    let (good, _) = instant_fetcher(json!({ "name": "Ann" }));

    ctx.client.query("user", || good(), &QueryOptions::new()).await.unwrap();
    let result = ctx
        .client
        .query(
            "user",
            || async { Err::<serde_json::Value, _>(FetchError::new("timeout")) },
            &QueryOptions::new().catch_error(false),
        )
        .await;

    assert!(matches!(result, Err(Error::Fetch(_))));
    let entry = ctx.store.get_state("user").unwrap();
    assert_eq!(entry.data, Some(json!({ "name": "Ann" })));
    assert_eq!(entry.error, Some(json!({ "message": "timeout" })));
}

#[tokio::test(start_paused = true)]
async fn test_envelope_with_custom_payload_field() {
    let mut config = CacheConfig::default();
    config.query.payload_field = "result".into();
    let ctx = TestContext::with_config(config);

    let (ok, _) = instant_fetcher(json!({ "result": { "id": 7 }, "data": "ignored" }));
    ctx.client.query("item", || ok(), &QueryOptions::new()).await.unwrap();
    assert_eq!(ctx.store.get_state("item").unwrap().data, Some(json!({ "id": 7 })));

    let (err, _) = instant_fetcher(json!({ "result": null, "reason": "gone" }));
    ctx.client.query("item", || err(), &QueryOptions::new()).await.unwrap();
    let entry = ctx.store.get_state("item").unwrap();
    assert_eq!(entry.error, Some(json!({ "result": null, "reason": "gone" })));
    assert_eq!(entry.data, Some(json!({ "id": 7 })));
}

#[tokio::test(start_paused = true)]
async fn test_paginated_feed_merges_pages() {
    let ctx = TestContext::new();
    let append = merge_fn(|prev, next| match (prev, next.as_array()) {
        (_, Some(items)) if items.is_empty() => MergeOutcome::Keep,
        (Some(prev), Some(items)) => {
            let mut all = prev.as_array().cloned().unwrap_or_default();
            all.extend(items.iter().cloned());
            MergeOutcome::Replace(json!(all))
        }
        _ => MergeOutcome::Replace(next.clone()),
    });
    let options = QueryOptions::new().merge(append);

    for page in [json!(["a", "b"]), json!(["c"]), json!([])] {
        let (f, _) = instant_fetcher(page);
        ctx.client.query("feed", || f(), &options).await.unwrap();
    }

    assert_eq!(ctx.store.get_state("feed").unwrap().data, Some(json!(["a", "b", "c"])));

    let clear = QueryOptions::new().merge(merge_fn(|_, _| MergeOutcome::Remove));
    let (f, _) = instant_fetcher(json!("reset"));
    ctx.client.query("feed", || f(), &clear).await.unwrap();
    assert!(ctx.store.get_state("feed").is_none());
}
