use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{CacheError, CacheKey, CacheStore};

/// The layout version of files written by the [`FilesystemStore`].
///
/// Bump this whenever the on-disk format changes, entries of other versions are ignored.
pub const STORE_VERSION: u32 = 1;

/// A [`CacheStore`] persisting values as JSON files below a directory.
///
/// Each entry lives at [`CacheKey::cache_path`] relative to the directory. Writes go to a
/// temporary file first, which is then atomically moved into place, so readers never observe
/// partially written entries. Concurrent writes for the same key are resolved by the last
/// writer winning.
pub struct FilesystemStore<V> {
    path: PathBuf,
    _value: PhantomData<fn() -> V>,
}

impl<V> fmt::Debug for FilesystemStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemStore")
            .field("path", &self.path)
            .finish()
    }
}

impl<V> FilesystemStore<V> {
    /// Creates a store below the directory at `path`.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }

    /// The directory this store writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The absolute path of the file that holds the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.path.join(key.cache_path(STORE_VERSION))
    }
}

#[async_trait]
impl<V> CacheStore<V> for FilesystemStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn get(&self, key: &CacheKey) -> Result<V, CacheError> {
        let abspath = self.entry_path(key);
        tracing::trace!("Fetching cache entry from {}", abspath.display());

        let contents = fs::read(&abspath).await?;
        Ok(serde_json::from_slice(&contents)?)
    }

    async fn put(&self, key: &CacheKey, value: V) -> Result<(), CacheError> {
        let abspath = self.entry_path(key);
        let contents = serde_json::to_vec(&value).context("Failed to serialize cache entry")?;

        let parent_dir = abspath
            .parent()
            .context("Cache entry has no parent directory")?;
        fs::create_dir_all(parent_dir)
            .await
            .context("Failed to create parent directories")?;

        let temp_dir = self.path.join(".tmp");
        fs::create_dir_all(&temp_dir)
            .await
            .context("failed to create tempdir")?;
        let temp_file = NamedTempFile::new_in(&temp_dir).context("failed to create tempfile")?;
        let dup_file = temp_file.reopen().context("failed to dup filedescriptor")?;
        let mut dest = fs::File::from_std(dup_file);

        dest.write_all(&contents)
            .await
            .context("Failed to copy data into file")?;
        dest.flush().await.context("Failed to flush file")?;

        tracing::trace!("Persisting cache entry at {}", abspath.display());
        temp_file
            .persist(&abspath)
            .context("Failed to save file in cache")?;
        Ok(())
    }
}
