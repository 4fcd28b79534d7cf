use std::time::Duration;

use memorace::{CacheKey, Delivered, Source};
use memorace_test::{EchoComputation, Lookups, MockStore};
use serde_json::json;
use tokio::time::Instant;

use crate::{assert_elapsed, millis, setup_memoizer};

#[tokio::test(start_paused = true)]
async fn test_empty_cache() {
    let (memoizer, store) = setup_memoizer(
        EchoComputation::new("slow_function", millis(100..=100)),
        MockStore::new(millis(0..=0)).with_lookups(Lookups::Fail),
        Duration::from_secs(5),
    );

    let start = Instant::now();
    let invocation = memoizer.invoke(json!({"hi": "there"})).await;
    assert_elapsed(start, Duration::from_millis(100));
    assert_eq!(
        invocation.result,
        Ok(Delivered {
            value: json!({"hi": "there"}),
            source: Source::Computation,
        })
    );

    invocation.refreshed.await.unwrap();
    let key = CacheKey::from_name("slow_function");
    assert_eq!(store.stored(&key), Some(json!({"hi": "there"})));
}

#[tokio::test(start_paused = true)]
async fn test_warm_cache() {
    let (memoizer, store) = setup_memoizer(
        EchoComputation::new("slow_function", millis(500..=500)),
        MockStore::new(millis(5..=100)),
        Duration::from_secs(5),
    );
    let key = CacheKey::from_name("slow_function");
    store.insert(key.clone(), json!({"ho": "hey"}));

    let start = Instant::now();
    let invocation = memoizer.invoke(json!({"hi": "there"})).await;
    assert!(start.elapsed() <= Duration::from_millis(100));
    assert_eq!(
        invocation.result,
        Ok(Delivered {
            value: json!({"ho": "hey"}),
            source: Source::Cache,
        })
    );

    // the computation finishes in the background and refreshes the entry
    assert_eq!(store.stored(&key), Some(json!({"ho": "hey"})));
    invocation.refreshed.await.unwrap();
    assert_elapsed(start, Duration::from_millis(500));
    assert_eq!(store.stored(&key), Some(json!({"hi": "there"})));
}

#[tokio::test(start_paused = true)]
async fn test_nobody_answers() {
    let (memoizer, store) = setup_memoizer(
        EchoComputation::stalled("slow_function"),
        MockStore::new(millis(0..=0)).with_lookups(Lookups::Stall),
        Duration::from_secs(5),
    );

    let start = Instant::now();
    let err = memoizer.call(json!({"hi": "there"})).await.unwrap_err();
    assert_elapsed(start, Duration::from_secs(5));

    insta::assert_snapshot!(err.to_string(), @"could not run slow_function successfully within 5s");
    assert_eq!(store.gets(), 1);
    assert_eq!(store.puts(), 0);
}
