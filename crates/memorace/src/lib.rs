//! A cache-aside memoizer for slow asynchronous computations.
//!
//! The [`RaceMemoizer`] wraps a [`ComputationDriver`] and a [`CacheStore`]. Every invocation
//! races a cache lookup against a fresh computation and delivers whichever one answers first.
//! The result of a successful computation is always written back to the cache, even if the
//! cache lookup already won, so that a stale or missing entry gets refreshed in the
//! background.
//!
//! Every invocation is bounded by a deadline (see [`MemoizerConfig`]). If neither participant
//! produced a value before it, the caller receives a [`MemoizeError::Timeout`]. This is the
//! only error that ever reaches the caller: cache misses, cache failures and computation
//! failures only influence which participant wins.
//!
//! [`MemoizerConfig`]: config::MemoizerConfig

#![warn(missing_docs)]

#[macro_use]
pub mod metrics;

mod cache_key;
pub mod config;
mod driver;
mod error;
mod gate;
pub mod logging;
mod memoizer;
pub mod store;

pub use cache_key::{CacheKey, CacheKeyBuilder};
pub use driver::{ComputationDriver, FnComputation};
pub use error::{CacheError, MemoizeError};
pub use memoizer::{Delivered, Invocation, RaceMemoizer, Source, memoize};
pub use store::CacheStore;
