use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use memorace::config::MemoizerConfig;
use memorace::store::{FilesystemStore, InMemoryStore};
use memorace::{CacheStore, ComputationDriver, RaceMemoizer};
use memorace_test::{EchoComputation, MockStore};
use rand::Rng;
use sentry::SentryFutureExt;
use sketches_ddsketch::DDSketch;
use tokio::sync::Semaphore;

use crate::workloads::{Store, Workload, WorkloadsConfig};

/// Measurements of running one workload for a fixed duration.
pub struct Measurement {
    pub durations: DDSketch,
    pub failures: usize,
}

pub async fn perform_stresstest(
    config: MemoizerConfig,
    workloads: WorkloadsConfig,
    duration: Duration,
) -> Result<()> {
    for (i, workload) in workloads.workloads.into_iter().enumerate() {
        let cache_dir = tempfile::tempdir().context("failed to create cache directory")?;
        let (direct, memoized) = match &workload.store {
            Store::Mock { latency } => {
                let store = MockStore::<u64>::new(latency.range());
                run_workload(&config, &workload, store, duration).await
            }
            Store::Memory => {
                let store = InMemoryStore::<u64>::new(workload.inputs);
                run_workload(&config, &workload, store, duration).await
            }
            Store::Filesystem => {
                let store = FilesystemStore::<u64>::new(cache_dir.path());
                run_workload(&config, &workload, store, duration).await
            }
        };

        println!(
            "Workload {i} `{}` (concurrency: {}):",
            workload.name, workload.concurrency
        );
        print_measurement("direct", &direct, duration);
        print_measurement("memoized", &memoized, duration);

        if let (Some(direct_avg), Some(memoized_avg)) = (average(&direct), average(&memoized)) {
            let speedup = direct_avg.as_secs_f64() / memoized_avg.as_secs_f64();
            println!("  speedup: {speedup:.2}x");
        }
        println!();
    }

    Ok(())
}

/// Runs the workload twice, calling the computation directly and through the memoizer.
async fn run_workload<S>(
    config: &MemoizerConfig,
    workload: &Workload,
    store: S,
    duration: Duration,
) -> (Measurement, Measurement)
where
    S: CacheStore<u64>,
{
    let mut driver = EchoComputation::new(&workload.name, workload.computation.range());
    if workload.keyed_by_input {
        driver = driver.keyed_by_input();
    }
    let memoizer = RaceMemoizer::with_config(driver, store, config);
    let inputs = workload.inputs.max(1);

    let direct = {
        let memoizer = memoizer.clone();
        run_for(workload.concurrency, duration, move || {
            let input = rand::rng().random_range(0..inputs);
            let computation = memoizer.driver().compute(input);
            async move { computation.await.is_ok() }
        })
        .await
    };

    // warmup: populate the cache for every input
    let warmup = futures::future::join_all((0..inputs).map(|input| {
        let memoizer = memoizer.clone();
        async move {
            memoizer.invoke(input).await.refreshed.await.ok();
        }
    }));
    warmup.await;

    let memoized = run_for(workload.concurrency, duration, move || {
        let input = rand::rng().random_range(0..inputs);
        let memoizer = memoizer.clone();
        async move { memoizer.call(input).await.is_ok() }
    })
    .await;

    (direct, memoized)
}

/// Keeps `concurrency` operations created by `make_op` in flight until `duration` passed.
///
/// Operations resolve to `true` on success.
async fn run_for<F, Fut>(concurrency: usize, duration: Duration, make_op: F) -> Measurement
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool> + Send + 'static,
{
    let start = Instant::now();
    let deadline = tokio::time::Instant::from_std(start + duration);
    let task_durations = Arc::new(Mutex::new(DDSketch::default()));
    let failures = Arc::new(Mutex::new(0));
    let semaphore = Arc::new(Semaphore::new(concurrency));

    // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        if deadline.elapsed() > Duration::ZERO {
            break;
        }
        tokio::select! {
            permit = semaphore.clone().acquire_owned() => {
                let op = make_op();
                let task_durations = Arc::clone(&task_durations);
                let failures = Arc::clone(&failures);
                let task_start = Instant::now();

                let hub = sentry::Hub::new_from_top(sentry::Hub::current());
                let ctx = sentry::TransactionContext::new("stresstest", "stresstest");
                let transaction = hub.start_transaction(ctx);

                let future = async move {
                    let ok = op.await;

                    transaction.finish();

                    if ok {
                        task_durations.lock().unwrap().add(task_start.elapsed().as_secs_f64());
                    } else {
                        *failures.lock().unwrap() += 1;
                    }

                    drop(permit);
                };
                let future = future.bind_hub(hub);

                tokio::spawn(future);
            }
            _ = &mut sleep => {
                break;
            }
        }
    }

    // by acquiring *all* the semaphores, we essentially wait for all outstanding tasks to finish
    let _permits = semaphore.acquire_many(concurrency as u32).await;

    let durations = std::mem::take(&mut *task_durations.lock().unwrap());
    let failures = *failures.lock().unwrap();
    Measurement {
        durations,
        failures,
    }
}

fn average(measurement: &Measurement) -> Option<Duration> {
    let ops = measurement.durations.count();
    let sum = measurement.durations.sum()?;
    (ops > 0).then(|| Duration::from_secs_f64(sum / ops as f64))
}

fn print_measurement(mode: &str, measurement: &Measurement, duration: Duration) {
    let durations = &measurement.durations;
    let ops = durations.count();
    let ops_ps = ops as f32 / duration.as_secs_f32();
    println!(
        "  {mode}: {ops} operations, {ops_ps:.2} ops/s, {} failed",
        measurement.failures
    );

    let (Some(avg), Ok(Some(p50)), Ok(Some(p90)), Ok(Some(p99))) = (
        average(measurement),
        durations.quantile(0.5),
        durations.quantile(0.9),
        durations.quantile(0.99),
    ) else {
        return;
    };
    let p50 = Duration::from_secs_f64(p50);
    let p90 = Duration::from_secs_f64(p90);
    let p99 = Duration::from_secs_f64(p99);
    println!("    avg: {avg:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}");
}
