use std::fmt;

use async_trait::async_trait;
use moka::future::Cache;

use crate::{CacheError, CacheKey, CacheStore};

/// A bounded in-memory [`CacheStore`].
///
/// Once `capacity` entries are stored, the least useful ones are evicted.
#[derive(Clone)]
pub struct InMemoryStore<V> {
    entries: Cache<CacheKey, V>,
}

impl<V> fmt::Debug for InMemoryStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl<V> InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .name("memorace")
            .build();
        Self { entries }
    }
}

#[async_trait]
impl<V> CacheStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<V, CacheError> {
        self.entries.get(key).await.ok_or(CacheError::NotFound)
    }

    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError> {
        self.entries.insert(key.clone(), value).await;
        Ok(())
    }
}
