use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The error delivered to callers of a [`RaceMemoizer`](crate::RaceMemoizer).
///
/// Neither cache failures nor computation failures are reported to the caller. They only
/// decide which participant of the race is allowed to deliver. When nobody delivered a
/// value before the deadline, the caller gets a [`Timeout`](Self::Timeout) naming the
/// computation, and loses the details of whatever went wrong along the way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MemoizeError {
    /// Neither the cache nor the computation produced a value within the deadline.
    #[error("could not run {computation} successfully within {deadline:?}")]
    Timeout {
        /// The name of the wrapped computation.
        computation: Arc<str>,
        /// The deadline that expired.
        deadline: Duration,
    },
}

/// An error produced by a [`CacheStore`](crate::CacheStore).
///
/// Lookup errors are expected and only mean the cache lost the race. Store errors are logged
/// and counted, but never reach the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// There is no entry for the requested key.
    #[error("not found")]
    NotFound,
    /// The cache backend did not respond in time.
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    /// An entry exists, but could not be decoded.
    #[error("malformed: {0}")]
    Malformed(String),
    /// Any other failure of the cache backend.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Other(err.into()),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl CacheError {
    /// A short, static description of the error kind, suitable as a metrics tag.
    pub fn metrics_tag(&self) -> &'static str {
        match self {
            Self::NotFound => "miss",
            Self::Timeout(_) => "timeout",
            Self::Malformed(_) => "malformed",
            Self::Other(_) => "error",
        }
    }
}
