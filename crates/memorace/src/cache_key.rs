use std::fmt::{self, Write};
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// The key under which a computation result is stored in a [`CacheStore`](crate::CacheStore).
///
/// A key consists of human-readable metadata describing what the cached value is, and the
/// SHA-256 hash of that metadata. Equality and hashing only consider the hash.
///
/// **NOTE**: Care must be taken to make sure that the metadata is stable, as it would otherwise
/// lead to bad cache reuse. Two computations that produce the same metadata share a cache entry.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    metadata: Arc<str>,
    hash: [u8; 32],
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.hash[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl CacheKey {
    /// Creates a [`CacheKey`] that only depends on the name of a computation.
    ///
    /// Every invocation of the same computation maps onto the same cache entry, regardless of
    /// its input.
    pub fn from_name(name: &str) -> Self {
        Self::builder(name).build()
    }

    /// Create a [`CacheKeyBuilder`] for the computation called `name`, which can be extended
    /// with further metadata, for example a description of the computation input.
    pub fn builder(name: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            metadata: format!("computation: {name}\n"),
        }
    }

    /// Returns the human-readable metadata that forms the basis of the [`CacheKey`].
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Returns the relative path for this cache key.
    ///
    /// The relative path is a sha-256 hash hex-formatted like so:
    /// `v$version/aa/bbccdd/eeff...`
    pub fn cache_path(&self, version: u32) -> String {
        let mut path = format!("v{version}/{:02x}/", self.hash[0]);
        for b in &self.hash[1..4] {
            // writing into a `String` can not fail
            let _ = write!(path, "{b:02x}");
        }
        path.push('/');
        for b in &self.hash[4..] {
            let _ = write!(path, "{b:02x}");
        }
        path
    }
}

/// A builder for [`CacheKey`]s.
///
/// This builder implements the [`Write`](std::fmt::Write) trait, and the intention of it is to
/// accept human readable, but most importantly **stable**, input.
/// This input in then being hashed to form the [`CacheKey`], and can also be logged to help
/// debugging.
pub struct CacheKeyBuilder {
    metadata: String,
}

impl CacheKeyBuilder {
    /// Appends a `name: value` line to the metadata.
    pub fn field(mut self, name: &str, value: impl fmt::Display) -> Self {
        let _ = writeln!(self.metadata, "{name}: {value}");
        self
    }

    /// Finalize the [`CacheKey`].
    pub fn build(self) -> CacheKey {
        let hash = Sha256::digest(&self.metadata);

        CacheKey {
            metadata: self.metadata.into(),
            hash: hash.into(),
        }
    }
}

impl fmt::Write for CacheKeyBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.metadata.write_str(s)
    }
}
