use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::CacheKey;

/// The Computation Driver
///
/// The driver is responsible for providing the actual computation that is supposed to be
/// memoized, as well as determining the cache key.
pub trait ComputationDriver: Send + Sync + 'static {
    /// Input argument to the driver.
    type Arg: Send + 'static;
    /// The resulting output of the computation.
    type Output: Clone + Send + Sync + 'static;
    /// The computation Future type.
    type Computation: Future<Output = anyhow::Result<Self::Output>> + Send + 'static;

    /// The identity of this computation, used in error messages, logs and metrics.
    fn name(&self) -> &str;

    /// Returns the cache key corresponding to the `arg`.
    ///
    /// By default, this only depends on [`name`](Self::name), which means that all invocations
    /// share one cache entry, and so do distinct computations sharing a name. Drivers whose
    /// output depends on their input should override this.
    fn cache_key(&self, _arg: &Self::Arg) -> CacheKey {
        CacheKey::from_name(self.name())
    }

    /// Starts a fresh computation.
    fn compute(&self, arg: Self::Arg) -> Self::Computation;
}

/// A [`ComputationDriver`] backed by a named async function.
pub struct FnComputation<F, A> {
    name: Arc<str>,
    f: F,
    _arg: PhantomData<fn(A)>,
}

impl<F, A> FnComputation<F, A> {
    /// Wraps the function `f` into a driver called `name`.
    pub fn new(name: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _arg: PhantomData,
        }
    }
}

impl<F, A> fmt::Debug for FnComputation<F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComputation")
            .field("name", &self.name)
            .finish()
    }
}

impl<F, Fut, A, T> ComputationDriver for FnComputation<F, A>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Arg = A;
    type Output = T;
    type Computation = Fut;

    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, arg: Self::Arg) -> Self::Computation {
        (self.f)(arg)
    }
}
