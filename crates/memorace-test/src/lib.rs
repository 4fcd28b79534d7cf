//! Helpers and mock collaborators for testing the memoizer.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - The mocks simulate latency with [`tokio::time::sleep`]. Run tests with
//!    `#[tokio::test(start_paused = true)]` so that they finish instantly and measure
//!    durations in virtual time.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. Assign it to a variable in the test function (e.g.
//!    `let _cache_dir = memorace_test::tempdir()`).

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rand::Rng;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

use memorace::{CacheError, CacheKey, CacheStore, ComputationDriver};

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `memorace` crate and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("memorace=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped. Use it as a guard to
/// automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Picks a uniformly distributed duration within `range`.
pub fn random_latency(range: &RangeInclusive<Duration>) -> Duration {
    rand::rng().random_range(range.clone())
}

/// A slow computation that echoes its input after a random latency.
pub struct EchoComputation<T> {
    name: String,
    latency: RangeInclusive<Duration>,
    keyed_by_input: bool,
    calls: AtomicUsize,
    _output: PhantomData<fn(T) -> T>,
}

impl<T> EchoComputation<T> {
    /// Creates a computation called `name`, taking between the bounds of `latency`.
    pub fn new(name: &str, latency: RangeInclusive<Duration>) -> Self {
        Self {
            name: name.to_owned(),
            latency,
            keyed_by_input: false,
            calls: AtomicUsize::new(0),
            _output: PhantomData,
        }
    }

    /// Creates a computation that never finishes within any reasonable deadline.
    pub fn stalled(name: &str) -> Self {
        let forever = Duration::from_secs(24 * 60 * 60);
        Self::new(name, forever..=forever)
    }

    /// Derives the cache key from the input as well as the name.
    pub fn keyed_by_input(mut self) -> Self {
        self.keyed_by_input = true;
        self
    }

    /// The number of computations started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<T> ComputationDriver for EchoComputation<T>
where
    T: Clone + fmt::Display + Send + Sync + 'static,
{
    type Arg = T;
    type Output = T;
    type Computation = BoxFuture<'static, anyhow::Result<T>>;

    fn name(&self) -> &str {
        &self.name
    }

    fn cache_key(&self, arg: &T) -> CacheKey {
        if self.keyed_by_input {
            CacheKey::builder(&self.name).field("input", arg).build()
        } else {
            CacheKey::from_name(&self.name)
        }
    }

    fn compute(&self, arg: T) -> Self::Computation {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let latency = random_latency(&self.latency);
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            Ok::<_, anyhow::Error>(arg)
        })
    }
}

/// A computation that fails after the given latency.
pub struct FailingComputation<T> {
    name: String,
    latency: Duration,
    _output: PhantomData<fn(T) -> T>,
}

impl<T> FailingComputation<T> {
    /// Creates a computation called `name` that fails after `latency`.
    pub fn new(name: &str, latency: Duration) -> Self {
        Self {
            name: name.to_owned(),
            latency,
            _output: PhantomData,
        }
    }
}

impl<T> ComputationDriver for FailingComputation<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Arg = T;
    type Output = T;
    type Computation = BoxFuture<'static, anyhow::Result<T>>;

    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, _arg: T) -> Self::Computation {
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            Err::<T, _>(anyhow::anyhow!("computation failed"))
        })
    }
}

/// How the [`MockStore`] answers lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookups {
    /// Answers with the stored value, or [`CacheError::NotFound`] if absent.
    Normal,
    /// Fails every lookup after the latency.
    Fail,
    /// Never answers.
    Stall,
}

/// An in-memory cache with simulated lookup latency and injectable failures.
///
/// Writes are applied immediately.
pub struct MockStore<V> {
    entries: Mutex<HashMap<CacheKey, V>>,
    latency: RangeInclusive<Duration>,
    lookups: Lookups,
    fail_puts: bool,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl<V: Clone> MockStore<V> {
    /// Creates an empty store answering lookups between the bounds of `latency`.
    pub fn new(latency: RangeInclusive<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            latency,
            lookups: Lookups::Normal,
            fail_puts: false,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }

    /// Changes how lookups are answered.
    pub fn with_lookups(mut self, lookups: Lookups) -> Self {
        self.lookups = lookups;
        self
    }

    /// Makes every write fail.
    pub fn with_failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    /// Seeds the store with `value` under `key`.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.entries.lock().unwrap().insert(key, value);
    }

    /// The value currently stored under `key`.
    pub fn stored(&self, key: &CacheKey) -> Option<V> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// The number of lookups so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    /// The number of writes so far, including failed ones.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<V> CacheStore<V> for MockStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "mock"
    }

    async fn get(&self, key: &CacheKey) -> Result<V, CacheError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if self.lookups == Lookups::Stall {
            return std::future::pending().await;
        }

        tokio::time::sleep(random_latency(&self.latency)).await;
        if self.lookups == Lookups::Fail {
            return Err(anyhow::anyhow!("lookup failed").into());
        }
        self.stored(key).ok_or(CacheError::NotFound)
    }

    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if self.fail_puts {
            return Err(anyhow::anyhow!("write failed").into());
        }
        self.insert(key.clone(), value);
        Ok(())
    }
}
