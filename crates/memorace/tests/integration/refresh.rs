use std::time::Duration;

use memorace::{CacheKey, Source};
use memorace_test::{EchoComputation, Lookups, MockStore};

use crate::{millis, setup_memoizer, slow_cache, slow_function};

#[tokio::test(start_paused = true)]
async fn test_refresh_after_cache_hit() {
    let (memoizer, store) = setup_memoizer(
        EchoComputation::new("slow_function", millis(200..=300)),
        MockStore::new(millis(5..=100)),
        Duration::from_secs(5),
    );
    let key = CacheKey::from_name("slow_function");
    store.insert(key.clone(), 0);

    for input in 1..=10 {
        let invocation = memoizer.invoke(input).await;
        let delivered = invocation.result.unwrap();
        assert_eq!(delivered.source, Source::Cache);
        assert_eq!(delivered.value, input - 1);

        invocation.refreshed.await.unwrap();
        assert_eq!(store.stored(&key), Some(input));
    }
    assert_eq!(store.puts(), 10);
    assert_eq!(memoizer.driver().calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_outlives_caller() {
    let (memoizer, store) = setup_memoizer(
        EchoComputation::new("slow_function", millis(100..=100)),
        slow_cache(),
        Duration::from_secs(5),
    );

    // the caller gives up long before anybody answers
    let res = tokio::time::timeout(Duration::from_millis(1), memoizer.call(42)).await;
    assert!(res.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.stored(&CacheKey::from_name("slow_function")), Some(42));
}

#[tokio::test(start_paused = true)]
async fn test_failing_writes() {
    let (memoizer, store) = setup_memoizer(
        slow_function(),
        slow_cache().with_failing_puts(),
        Duration::from_secs(5),
    );

    for input in 0..3 {
        let invocation = memoizer.invoke(input).await;
        assert_eq!(invocation.result.unwrap().value, input);
        assert!(invocation.refreshed.await.is_err());
    }
    assert_eq!(store.puts(), 3);
    assert_eq!(store.stored(&CacheKey::from_name("slow_function")), None);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_cache() {
    let (memoizer, store) = setup_memoizer(
        slow_function(),
        slow_cache().with_lookups(Lookups::Stall),
        Duration::from_secs(5),
    );

    for input in 0..3 {
        let delivered = memoizer.invoke(input).await.result.unwrap();
        assert_eq!(delivered.source, Source::Computation);
        assert_eq!(delivered.value, input);
    }
    assert_eq!(store.gets(), 3);
}
