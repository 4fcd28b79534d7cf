use std::sync::Arc;
use std::time::Duration;

use memorace::{CacheKey, RaceMemoizer, Source};
use memorace_test::{EchoComputation, MockStore};

use crate::{millis, setup_memoizer};

fn fast_cache() -> MockStore<u64> {
    MockStore::new(millis(5..=10))
}

fn slow(name: &str) -> EchoComputation<u64> {
    EchoComputation::new(name, millis(500..=500))
}

#[tokio::test(start_paused = true)]
async fn test_keyed_by_name() {
    let (memoizer, store) =
        setup_memoizer(slow("slow_function"), fast_cache(), Duration::from_secs(5));
    store.insert(CacheKey::from_name("another_function"), 1);

    // entries of other computations are not visible
    let invocation = memoizer.invoke(2).await;
    let delivered = invocation.result.unwrap();
    assert_eq!(delivered.source, Source::Computation);
    assert_eq!(delivered.value, 2);
    invocation.refreshed.await.unwrap();

    // but distinct computations sharing a name share their entry
    let other = RaceMemoizer::new(
        EchoComputation::new("slow_function", millis(600..=600)),
        Arc::clone(&store),
    );
    let delivered = other.invoke(3).await.result.unwrap();
    assert_eq!(delivered.source, Source::Cache);
    assert_eq!(delivered.value, 2);
}

#[tokio::test(start_paused = true)]
async fn test_keyed_by_input() {
    let (memoizer, store) = setup_memoizer(
        slow("slow_function").keyed_by_input(),
        fast_cache(),
        Duration::from_secs(5),
    );

    let invocation = memoizer.invoke(1).await;
    assert_eq!(invocation.result.unwrap().source, Source::Computation);
    invocation.refreshed.await.unwrap();

    // another input misses
    let invocation = memoizer.invoke(2).await;
    let delivered = invocation.result.unwrap();
    assert_eq!(delivered.source, Source::Computation);
    assert_eq!(delivered.value, 2);
    invocation.refreshed.await.unwrap();

    // while both inputs hit now
    for input in [1, 2] {
        let delivered = memoizer.invoke(input).await.result.unwrap();
        assert_eq!(delivered.source, Source::Cache);
        assert_eq!(delivered.value, input);
    }

    let key = CacheKey::builder("slow_function").field("input", 2).build();
    assert_eq!(store.stored(&key), Some(2));
    assert_eq!(store.stored(&CacheKey::from_name("slow_function")), None);
}
