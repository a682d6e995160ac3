use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use fetch_cache::parse_fields;
use fetch_cache::BindingOptions;
use fetch_cache::Projection;
use fetch_cache::QueryBinding;
use fetch_cache::QueryOptions;
use fetch_cache::Selection;
use fetch_cache::StateField;
use fetch_cache::Store;
use serde_json::json;
use tokio::time;

use crate::commons::slow_fetcher;
use crate::commons::TestContext;
use crate::commons::POLL_INTERVAL;

#[tokio::test(start_paused = true)]
async fn test_observer_sees_loading_then_data() {
    let ctx = TestContext::new();
    let (f, _) = slow_fetcher(json!({ "name": "Ann" }), Duration::from_millis(200));
    let options = BindingOptions {
        fields: parse_fields(["inFlight", "error"]).unwrap(),
        ..Default::default()
    };

    let mut binding = QueryBinding::bind(ctx.client.clone(), "user", f, options).unwrap();

    let loading = time::timeout(Duration::from_secs(1), binding.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loading.in_flight_count(), 1);
    assert_eq!(loading.data, None);

    let loaded = time::timeout(Duration::from_secs(1), binding.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.in_flight_count(), 0);
    assert_eq!(loaded.data, Some(json!({ "name": "Ann" })));
    assert_eq!(loaded.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_polled_binding_only_notifies_on_change() {
    let ctx = TestContext::new();
    let (f, calls) = slow_fetcher(json!("same"), Duration::from_millis(10));
    let options = BindingOptions {
        interval: Some(POLL_INTERVAL),
        // Ignore data_timestamp: only a new value counts as a change
        equality: Some(Arc::new(|a: &Projection, b: &Projection| a.data == b.data)),
        ..Default::default()
    };

    let mut binding = QueryBinding::bind(ctx.client.clone(), "status", f, options).unwrap();
    let first = time::timeout(Duration::from_secs(1), binding.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.data, Some(json!("same")));

    let later = time::timeout(POLL_INTERVAL * 3, binding.changed()).await;
    assert!(later.is_err());
    assert!(calls.load(Ordering::SeqCst) >= 3);
    binding.unbind();
}

#[tokio::test(start_paused = true)]
async fn test_store_subscription_without_binding() {
    let ctx = TestContext::new();
    let mut sub = ctx.store.subscribe(
        Selection::new("user").with_fields([StateField::GoodFetchOrdinal]),
        Arc::new(fetch_cache::deep_equal),
    );
    assert_eq!(sub.current().data, None);

    ctx.client
        .query(
            "user",
            || async { Ok::<_, fetch_cache::FetchError>(json!(42)) },
            &QueryOptions::new(),
        )
        .await
        .unwrap();

    let next = time::timeout(Duration::from_secs(1), sub.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.data, Some(json!(42)));
    assert_eq!(next.good_fetch_ordinal, Some(0));
}
