use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use memorace::MemoizeError;
use memorace_test::{EchoComputation, FailingComputation, Lookups, MockStore};
use tokio::time::Instant;

use crate::{assert_elapsed, millis, setup_memoizer, slow_cache, slow_function};

#[derive(Default)]
struct Deliveries {
    values: AtomicUsize,
    timeouts: AtomicUsize,
}

impl Deliveries {
    fn record(&self, result: Result<u64, MemoizeError>) {
        match result {
            Ok(_) => self.values.fetch_add(1, Ordering::SeqCst),
            Err(_) => self.timeouts.fetch_add(1, Ordering::SeqCst),
        };
    }

    fn total(&self) -> usize {
        self.values.load(Ordering::SeqCst) + self.timeouts.load(Ordering::SeqCst)
    }
}

#[tokio::test(start_paused = true)]
async fn test_delivers_exactly_once() {
    // the deadline sits right in the middle of the computation latency, so all three
    // participants win some of the races
    let (memoizer, store) =
        setup_memoizer(slow_function(), slow_cache(), Duration::from_millis(300));
    let deliveries = Arc::new(Deliveries::default());

    for round in 0..5 {
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let deliveries = Arc::clone(&deliveries);
                memoizer.call_with(round * 20 + i, move |result| deliveries.record(result))
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
    }
    assert_eq!(deliveries.total(), 100);

    // losing participants finishing later do not deliver again
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(deliveries.total(), 100);
    assert_eq!(store.gets(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delivers_exactly_once_in_parallel() {
    let (memoizer, _store) = setup_memoizer(
        EchoComputation::new("slow_function", millis(0..=3)),
        MockStore::new(millis(0..=3)),
        Duration::from_millis(2),
    );
    let deliveries = Arc::new(Deliveries::default());

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let deliveries = Arc::clone(&deliveries);
            memoizer.call_with(i, move |result| deliveries.record(result))
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(deliveries.total(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_both_failing() {
    let (memoizer, store) = setup_memoizer(
        FailingComputation::<u64>::new("slow_function", Duration::from_millis(50)),
        MockStore::new(millis(5..=5)).with_lookups(Lookups::Fail),
        Duration::from_secs(1),
    );

    let start = Instant::now();
    let invocation = memoizer.invoke(1).await;
    assert_elapsed(start, Duration::from_secs(1));

    assert_eq!(
        invocation.result,
        Err(MemoizeError::Timeout {
            computation: "slow_function".into(),
            deadline: Duration::from_secs(1),
        })
    );
    assert!(invocation.refreshed.await.is_err());
    assert_eq!(store.puts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_participants() {
    let (memoizer, store) = setup_memoizer(
        EchoComputation::new("slow_function", millis(1500..=1500)),
        MockStore::new(millis(1200..=1200)),
        Duration::from_secs(1),
    );

    let start = Instant::now();
    let invocation = memoizer.invoke(1).await;
    assert_elapsed(start, Duration::from_secs(1));
    assert!(invocation.result.is_err());

    // the cache lookup misses, but the late computation still fills it
    invocation.refreshed.await.unwrap();
    assert_elapsed(start, Duration::from_millis(1500));
    assert_eq!(store.puts(), 1);
}
