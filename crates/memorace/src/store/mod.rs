//! The cache collaborator consumed by the [`RaceMemoizer`](crate::RaceMemoizer).
//!
//! The memoizer does not care how values are stored, evicted or persisted. It only needs a
//! [`CacheStore`] that answers lookups and accepts writes. Two stores are bundled:
//!
//! - [`InMemoryStore`] keeps values in a bounded in-process cache.
//! - [`FilesystemStore`] serializes values as JSON files below a cache directory, which makes
//!   them survive restarts and shareable between processes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{CacheError, CacheKey};

mod fs;
mod memory;

pub use fs::{FilesystemStore, STORE_VERSION};
pub use memory::InMemoryStore;

/// An asynchronous key-value cache.
///
/// Both operations answer exactly once. Concurrent reads and writes for the same key,
/// including writes racing each other, are the responsibility of the implementation.
#[async_trait]
pub trait CacheStore<V>: Send + Sync + 'static {
    /// A short name of the cache backend, used in logs and metrics.
    fn name(&self) -> &str;

    /// Looks up the value stored under `key`.
    ///
    /// An absent value is reported as [`CacheError::NotFound`].
    async fn get(&self, key: &CacheKey) -> Result<V, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError>;
}

#[async_trait]
impl<V, S> CacheStore<V> for Arc<S>
where
    V: Send + 'static,
    S: CacheStore<V> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get(&self, key: &CacheKey) -> Result<V, CacheError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError> {
        (**self).put(key, value).await
    }
}
