use crate::error::{BoxError, LoadError};
use crate::key::{CacheKey, CacheValue};

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, Thread};

use parking_lot::Mutex;

/// Computes values for keys the cache does not hold.
///
/// `load` is invoked by `LoadingCache::get` under single-flight
/// coordination: for any key, at most one `load` runs at a time, and
/// concurrent callers share its outcome. `load_all` is invoked by
/// `get_all`, once per batch of missing keys; it may be called concurrently
/// for distinct batches.
pub trait CacheLoader<V>: Send + Sync {
  fn load(&self, key: &CacheKey) -> Result<CacheValue<V>, BoxError>;

  /// Loads a batch of keys at once. The default delegates to `load` per
  /// key, failing the whole batch on the first error.
  ///
  /// A key omitted from the returned map is treated as failed for this
  /// call (the caller sees the sentinel) without failing its batch mates.
  fn load_all(&self, keys: &[CacheKey]) -> Result<HashMap<CacheKey, CacheValue<V>>, BoxError> {
    let mut out = HashMap::with_capacity(keys.len());
    for key in keys {
      out.insert(key.clone(), self.load(key)?);
    }
    Ok(out)
  }
}

/// The internal state of a value being loaded.
pub(crate) enum LoadState<V> {
  Computing,
  Complete(Arc<CacheValue<V>>),
  Failed(LoadError),
}

struct Inner<V> {
  state: LoadState<V>,
  waiters: VecDeque<Thread>,
}

/// The single-flight slot for one in-progress load.
///
/// The first caller for a key installs one of these under the stripe lock
/// and becomes the loader; every racing caller parks on it and receives the
/// broadcast outcome. The slot is removed from its stripe before the
/// broadcast, so once a waiter wakes, a fresh lookup either hits the stored
/// value or starts a new load.
pub(crate) struct LoadFuture<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the "Computing" state.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: LoadState::Computing,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Completes the future with a value, waking all waiters.
  pub(crate) fn complete(&self, value: Arc<CacheValue<V>>) {
    let mut inner = self.inner.lock();
    inner.state = LoadState::Complete(value);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Fails the future, broadcasting the error to all waiters.
  pub(crate) fn fail(&self, error: LoadError) {
    let mut inner = self.inner.lock();
    inner.state = LoadState::Failed(error);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks the current thread until the load completes or fails.
  pub(crate) fn wait(&self) -> Result<Arc<CacheValue<V>>, LoadError> {
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        LoadState::Complete(value) => return Ok(value.clone()),
        LoadState::Failed(error) => return Err(error.clone()),
        LoadState::Computing => {
          inner.waiters.push_back(thread::current());
          drop(inner); // Unlock before parking.
          thread::park();
          inner = self.inner.lock();
        }
      }
    }
  }
}
