use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sentry::{Hub, SentryFutureExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::MemoizerConfig;
use crate::gate::DeliveryGate;
use crate::{CacheError, CacheKey, CacheStore, ComputationDriver, FnComputation, MemoizeError};

/// Where a delivered value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The cache lookup answered first.
    Cache,
    /// The fresh computation answered first.
    Computation,
}

impl AsRef<str> for Source {
    fn as_ref(&self) -> &str {
        match self {
            Source::Cache => "cache",
            Source::Computation => "computation",
        }
    }
}

/// A value delivered by the winner of the race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered<T> {
    /// The delivered value.
    pub value: T,
    /// The participant that delivered it.
    pub source: Source,
}

/// The outcome of [`RaceMemoizer::invoke`].
#[derive(Debug)]
pub struct Invocation<T> {
    /// The value delivered to the caller, or the timeout.
    pub result: Result<Delivered<T>, MemoizeError>,
    /// Resolves once the result of the computation has been written to the cache.
    ///
    /// The computation keeps running in the background after losing the race or hitting the
    /// deadline. If it fails, or the cache write fails, the sender is dropped and awaiting
    /// this resolves into an [`Err`]. It can safely be ignored.
    pub refreshed: oneshot::Receiver<()>,
}

/// Wraps a slow computation and accelerates it with a cache.
///
/// Each invocation races a [`CacheStore::get`] against a fresh
/// [`ComputationDriver::compute`], and delivers the first successful answer. A successful
/// computation always writes its result to the cache, whether or not it won. If nobody
/// answers within the configured deadline, a [`MemoizeError::Timeout`] is delivered instead.
///
/// Both participants run as detached tasks, so neither losing the race nor dropping the
/// invocation stops them. Only the deadline is cancelled when a value is delivered.
pub struct RaceMemoizer<D, S> {
    driver: Arc<D>,
    store: Arc<S>,
    name: Arc<str>,
    deadline: Duration,
}

impl<D, S> Clone for RaceMemoizer<D, S> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            store: Arc::clone(&self.store),
            name: Arc::clone(&self.name),
            deadline: self.deadline,
        }
    }
}

impl<D, S> std::fmt::Debug for RaceMemoizer<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceMemoizer")
            .field("name", &self.name)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Memoizes the async function `f`, identified by `name`, using `store`.
///
/// All invocations share a single cache entry derived from `name`.
pub fn memoize<F, Fut, A, T, S>(
    name: &str,
    f: F,
    store: S,
) -> RaceMemoizer<FnComputation<F, A>, S>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    S: CacheStore<T>,
{
    RaceMemoizer::new(FnComputation::new(name, f), store)
}

impl<D, S> RaceMemoizer<D, S>
where
    D: ComputationDriver,
    S: CacheStore<D::Output>,
{
    /// Creates a new memoizer with the default deadline.
    pub fn new(driver: D, store: S) -> Self {
        Self::with_config(driver, store, &MemoizerConfig::default())
    }

    /// Creates a new memoizer from the given configuration.
    pub fn with_config(driver: D, store: S, config: &MemoizerConfig) -> Self {
        let name = driver.name().into();
        Self {
            driver: Arc::new(driver),
            store: Arc::new(store),
            name,
            deadline: config.deadline,
        }
    }

    /// The name of the wrapped computation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The time after which invocations give up.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// The wrapped computation.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The cache used to accelerate the computation.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets the value for `arg`, from the cache or a fresh computation, whichever is faster.
    pub async fn call(&self, arg: D::Arg) -> Result<D::Output, MemoizeError> {
        self.invoke(arg).await.result.map(|delivered| delivered.value)
    }

    /// Spawns an invocation for `arg`, calling `deliver` exactly once with its result.
    pub fn call_with<F>(&self, arg: D::Arg, deliver: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<D::Output, MemoizeError>) + Send + 'static,
    {
        let this = self.clone();
        let task = async move { deliver(this.call(arg).await) };
        tokio::spawn(task.bind_hub(Hub::new_from_top(Hub::current())))
    }

    /// Races the cache against a fresh computation for `arg`.
    ///
    /// See the [`RaceMemoizer`] docs for the details of the race. Besides the delivered value,
    /// the returned [`Invocation`] tells which participant won, and allows waiting for the
    /// background cache refresh.
    pub async fn invoke(&self, arg: D::Arg) -> Invocation<D::Output> {
        let name = self.name();
        metric!(counter("memoize.access") += 1, "computation" => name);

        let start = Instant::now();
        let key = self.driver.cache_key(&arg);
        tracing::trace!(computation = name, %key, "Racing cache lookup and computation");

        let (gate, mut delivery) = DeliveryGate::new();
        let (refreshed_tx, refreshed) = oneshot::channel();

        self.spawn_lookup(key.clone(), Arc::clone(&gate));
        self.spawn_computation(arg, key, Arc::clone(&gate), refreshed_tx);

        let result = match tokio::time::timeout(self.deadline, &mut delivery).await {
            Ok(Ok(delivered)) => Ok(delivered),
            // The sender is only dropped by passing the gate, so this does not happen while we
            // hold it. If it does, nobody can deliver anymore and the deadline applies.
            Ok(Err(_)) => {
                tokio::time::sleep_until(start + self.deadline).await;
                gate.close();
                Err(self.timeout())
            }
            Err(_elapsed) => {
                if gate.close() {
                    Err(self.timeout())
                } else {
                    // Somebody passed the gate right at the deadline, and the value is on its way.
                    delivery.await.map_err(|_| self.timeout())
                }
            }
        };

        match &result {
            Ok(delivered) => {
                metric!(
                    counter("memoize.delivered") += 1,
                    "computation" => name,
                    "source" => delivered.source.as_ref(),
                );
            }
            Err(_) => {
                tracing::debug!(computation = name, "Neither cache nor computation answered in time");
                metric!(counter("memoize.timeout") += 1, "computation" => name);
            }
        }
        metric!(
            timer("memoize.duration") = start.elapsed(),
            "computation" => name,
            "status" => if result.is_ok() { "ok" } else { "timeout" },
        );

        Invocation { result, refreshed }
    }

    fn timeout(&self) -> MemoizeError {
        MemoizeError::Timeout {
            computation: Arc::clone(&self.name),
            deadline: self.deadline,
        }
    }

    /// Looks the `key` up in the cache, delivering the cached value if the gate is still open.
    fn spawn_lookup(&self, key: CacheKey, gate: Arc<DeliveryGate<Delivered<D::Output>>>) {
        let store = Arc::clone(&self.store);
        let name = Arc::clone(&self.name);

        let task = async move {
            match store.get(&key).await {
                Ok(value) => {
                    let delivered = Delivered {
                        value,
                        source: Source::Cache,
                    };
                    if !gate.deliver(delivered) {
                        metric!(counter("memoize.lookup.late") += 1, "computation" => &name);
                    }
                }
                Err(err) => {
                    // lookup failures only lose the race
                    match &err {
                        CacheError::NotFound => {
                            tracing::trace!(computation = &*name, %key, "Cache miss");
                        }
                        err => {
                            let stderr: &dyn std::error::Error = err;
                            tracing::debug!(
                                stderr,
                                computation = &*name,
                                store = store.name(),
                                "Cache lookup failed",
                            );
                        }
                    }
                    metric!(
                        counter("memoize.lookup.miss") += 1,
                        "computation" => &name,
                        "status" => err.metrics_tag(),
                    );
                }
            }
        };
        tokio::spawn(task.bind_hub(Hub::new_from_top(Hub::current())));
    }

    /// Runs the computation, delivering its output if the gate is still open, and always
    /// writing a successful output to the cache.
    fn spawn_computation(
        &self,
        arg: D::Arg,
        key: CacheKey,
        gate: Arc<DeliveryGate<Delivered<D::Output>>>,
        refreshed_tx: oneshot::Sender<()>,
    ) {
        let driver = Arc::clone(&self.driver);
        let store = Arc::clone(&self.store);
        let name = Arc::clone(&self.name);

        let task = async move {
            let output = match driver.compute(arg).await {
                Ok(output) => output,
                Err(err) => {
                    let stderr: &dyn std::error::Error = err.as_ref();
                    tracing::debug!(stderr, computation = &*name, "Computation failed");
                    metric!(
                        counter("memoize.computation") += 1,
                        "computation" => &name,
                        "status" => "error",
                    );
                    return;
                }
            };

            let delivered = Delivered {
                value: output.clone(),
                source: Source::Computation,
            };
            let won = gate.deliver(delivered);
            // the gate is no longer needed, and the invocation may already be gone
            drop(gate);
            metric!(
                counter("memoize.computation") += 1,
                "computation" => &name,
                "status" => "ok",
                "won" => if won { "true" } else { "false" },
            );

            match store.put(&key, output).await {
                Ok(()) => {
                    metric!(
                        counter("memoize.store") += 1,
                        "computation" => &name,
                        "status" => "ok",
                    );
                    refreshed_tx.send(()).ok();
                }
                Err(err) => {
                    let stderr: &dyn std::error::Error = &err;
                    tracing::error!(
                        stderr,
                        computation = &*name,
                        store = store.name(),
                        %key,
                        "Could not store computation result in cache",
                    );
                    metric!(
                        counter("memoize.store") += 1,
                        "computation" => &name,
                        "status" => "error",
                    );
                }
            }
        };
        tokio::spawn(task.bind_hub(Hub::new_from_top(Hub::current())));
    }
}
