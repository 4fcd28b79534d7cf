use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct WorkloadsConfig {
    pub workloads: Vec<Workload>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Workload {
    pub name: String,
    pub concurrency: usize,
    /// How long the wrapped computation takes.
    pub computation: Latency,
    /// The cache backing the memoizer.
    #[serde(default)]
    pub store: Store,
    /// The number of distinct inputs calls are drawn from.
    #[serde(default = "default_inputs")]
    pub inputs: u64,
    /// Derive cache keys from the input instead of only the computation name.
    #[serde(default)]
    pub keyed_by_input: bool,
}

fn default_inputs() -> u64 {
    1
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Latency {
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Latency {
    pub fn range(&self) -> RangeInclusive<Duration> {
        self.min..=self.max.max(self.min)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum Store {
    /// An in-process cache with simulated lookup latency.
    Mock { latency: Latency },
    /// The bounded in-memory store.
    #[default]
    Memory,
    /// The filesystem store, below a temporary directory.
    Filesystem,
}
