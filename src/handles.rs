use crate::error::{BoxError, LoadError};
use crate::key::{CacheKey, CacheValue};
use crate::listener::RemovalCause;
use crate::loader::CacheLoader;
use crate::metrics::CacheStats;
use crate::shared::{BatchLoadFn, CacheShared};

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

/// A thread-safe, manually populated cache.
///
/// Values live behind `Arc<CacheValue<V>>`, so reads never clone the
/// payload and `V` needs no `Clone` bound. For a cache that knows how to
/// compute its own values, build a [`LoadingCache`] instead.
#[derive(Debug)]
pub struct Cache<V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<V, H>>,
}

impl<V, H> Clone for Cache<V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<V, H> Cache<V, H>
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Fetches the value for `key`, computing it with `f` on a miss.
  ///
  /// Concurrent callers for the same key share a single computation: one
  /// caller runs `f`, the rest block until it completes and receive the
  /// same value (or the same error). Errors are not cached; the next call
  /// retries.
  pub fn get_with<F>(&self, key: &CacheKey, f: F) -> Result<Arc<CacheValue<V>>, LoadError>
  where
    F: FnOnce() -> Result<CacheValue<V>, BoxError>,
  {
    self.shared.load_one(key, |_key| f())
  }

  /// Returns the value for `key` if a live entry is present.
  ///
  /// Never triggers a load. Absent, expired, and reclaimed entries all
  /// return `None`; a key whose load is in flight also looks absent here.
  pub fn get_if_present(&self, key: &CacheKey) -> Option<Arc<CacheValue<V>>> {
    self.shared.get_if_present(key)
  }

  /// Bulk `get_if_present`: returns the live entries among `keys`.
  pub fn get_all_present<I>(&self, keys: I) -> HashMap<CacheKey, Arc<CacheValue<V>>>
  where
    I: IntoIterator<Item = CacheKey>,
  {
    let mut out = HashMap::new();
    for key in keys {
      if out.contains_key(&key) {
        continue;
      }
      if let Some(value) = self.shared.get_if_present(&key) {
        out.insert(key, value);
      }
    }
    out
  }

  /// Unconditionally associates `value` with `key`.
  ///
  /// If an entry was present it is removed first and its removal reported
  /// as `Replaced` (or `Expired`, if it had already lapsed).
  pub fn put(&self, key: CacheKey, value: CacheValue<V>) {
    self.shared.insert(key, value);
  }

  /// Removes the entry for `key`, reporting `Explicit`. Returns `true` if
  /// an entry was present.
  pub fn invalidate(&self, key: &CacheKey) -> bool {
    self.shared.remove(key, RemovalCause::Explicit).is_some()
  }

  /// Removes every entry in `keys`, reporting `Explicit` for each.
  pub fn invalidate_all<I>(&self, keys: I)
  where
    I: IntoIterator<Item = CacheKey>,
  {
    for key in keys {
      self.shared.remove(&key, RemovalCause::Explicit);
    }
  }

  /// Removes all entries, reporting `Explicit` for each.
  pub fn clear(&self) {
    self.shared.clear();
  }

  /// A point-in-time snapshot of the cache's counters.
  pub fn stats(&self) -> CacheStats {
    self.shared.stats.snapshot()
  }

  /// The number of entries currently stored. Counted shard by shard, so
  /// the result is approximate while writers are active.
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Batch load-through with a caller-supplied batch function, for caches
  /// built without a [`CacheLoader`]. See [`LoadingCache::get_all`] for
  /// the batching, timeout, and sentinel semantics.
  pub fn get_all_with<I, F>(&self, keys: I, batch_fn: F) -> HashMap<CacheKey, Arc<CacheValue<V>>>
  where
    I: IntoIterator<Item = CacheKey>,
    F: Fn(&[CacheKey]) -> Result<HashMap<CacheKey, CacheValue<V>>, BoxError>
      + Send
      + Sync
      + 'static,
  {
    let loader: BatchLoadFn<V> = Arc::new(batch_fn);
    self.shared.get_all_batched(keys.into_iter().collect(), loader)
  }
}

/// A cache that computes missing values with its configured
/// [`CacheLoader`].
///
/// All of the manual [`Cache`] operations remain available through
/// [`LoadingCache::cache`] or the delegating methods below.
pub struct LoadingCache<V, H = ahash::RandomState> {
  pub(crate) cache: Cache<V, H>,
  pub(crate) loader: Arc<dyn CacheLoader<V>>,
}

impl<V, H> std::fmt::Debug for LoadingCache<V, H> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoadingCache")
      .field("cache", &self.cache.shared)
      .finish_non_exhaustive()
  }
}

impl<V, H> Clone for LoadingCache<V, H> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      loader: self.loader.clone(),
    }
  }
}

impl<V, H> LoadingCache<V, H>
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// The underlying manual cache handle.
  pub fn cache(&self) -> &Cache<V, H> {
    &self.cache
  }

  /// Fetches the value for `key`, invoking the configured loader on a
  /// miss. Single-flight: concurrent callers for one key share one load.
  pub fn get(&self, key: &CacheKey) -> Result<Arc<CacheValue<V>>, LoadError> {
    self
      .cache
      .shared
      .load_one(key, |key| self.loader.load(key))
  }

  /// Fetches values for `keys`, batch-loading the missing ones.
  ///
  /// Missing keys are grouped into batches of the configured batch size
  /// and dispatched to the cache's worker pool; the call waits up to the
  /// configured batch timeout for all batches. Keys whose batch failed or
  /// did not finish in time map to the empty sentinel value
  /// ([`CacheValue::is_empty`]) and are not cached, so a later call
  /// retries them. A batch that completes after the deadline is discarded,
  /// never merged.
  pub fn get_all<I>(&self, keys: I) -> HashMap<CacheKey, Arc<CacheValue<V>>>
  where
    I: IntoIterator<Item = CacheKey>,
  {
    let loader = self.loader.clone();
    let batch_fn: BatchLoadFn<V> = Arc::new(move |keys: &[CacheKey]| loader.load_all(keys));
    self
      .cache
      .shared
      .get_all_batched(keys.into_iter().collect(), batch_fn)
  }

  pub fn get_if_present(&self, key: &CacheKey) -> Option<Arc<CacheValue<V>>> {
    self.cache.get_if_present(key)
  }

  pub fn put(&self, key: CacheKey, value: CacheValue<V>) {
    self.cache.put(key, value);
  }

  pub fn invalidate(&self, key: &CacheKey) -> bool {
    self.cache.invalidate(key)
  }

  pub fn invalidate_all<I>(&self, keys: I)
  where
    I: IntoIterator<Item = CacheKey>,
  {
    self.cache.invalidate_all(keys)
  }

  pub fn stats(&self) -> CacheStats {
    self.cache.stats()
  }

  pub fn len(&self) -> usize {
    self.cache.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cache.is_empty()
  }
}
