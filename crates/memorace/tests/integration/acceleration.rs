use std::time::Duration;

use futures::{StreamExt, stream};
use memorace::ComputationDriver;
use tokio::time::Instant;

use crate::{setup_memoizer, slow_cache, slow_function};

const CALLS: u64 = 100;
const CONCURRENCY: usize = 10;

#[tokio::test(start_paused = true)]
async fn test_accelerates_repeated_calls() {
    let (memoizer, _store) = setup_memoizer(slow_function(), slow_cache(), Duration::from_secs(5));

    let start = Instant::now();
    let outputs: Vec<_> = stream::iter(0..CALLS)
        .map(|i| memoizer.driver().compute(i))
        .buffer_unordered(CONCURRENCY)
        .collect()
        .await;
    let direct = start.elapsed();
    assert!(outputs.iter().all(|output| output.is_ok()));

    // populate the cache
    let invocation = memoizer.invoke(CALLS).await;
    invocation.refreshed.await.unwrap();

    let start = Instant::now();
    let outputs: Vec<_> = stream::iter(0..CALLS)
        .map(|i| memoizer.call(i))
        .buffer_unordered(CONCURRENCY)
        .collect()
        .await;
    let memoized = start.elapsed();
    assert!(outputs.iter().all(|output| output.is_ok()));

    assert!(
        3 * memoized < direct,
        "memoized calls took {memoized:?}, direct calls {direct:?}"
    );
}
