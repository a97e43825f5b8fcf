use crate::entry::RefStrength;
use crate::error::BuildError;
use crate::handles::{Cache, LoadingCache};
use crate::listener::RemovalListener;
use crate::loader::CacheLoader;
use crate::metrics::StatsRecorder;
use crate::shared::CacheShared;
use crate::store::ShardedStore;
use crate::task::notifier::Notifier;

use core::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;

/// The original deployment loaded in groups of four keys per batch.
const DEFAULT_BATCH_SIZE: u32 = 4;
/// Default absolute deadline for a `get_all` call's batches.
const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(100);

/// A builder for creating [`Cache`] and [`LoadingCache`] instances.
///
/// ```
/// use loadcache::{CacheBuilder, CacheKey, CacheValue};
/// use std::time::Duration;
///
/// let cache = CacheBuilder::new()
///   .maximum_size(10_000)
///   .expire_after_write(Duration::from_secs(30 * 60))
///   .build::<String>()
///   .unwrap();
///
/// cache.put(CacheKey::new("key", "field"), CacheValue::new("v".to_string()));
/// ```
pub struct CacheBuilder<H = ahash::RandomState> {
  maximum_size: u64,
  initial_capacity: u32,
  concurrency_level: u32,
  expire_after_write: Option<Duration>,
  expire_after_access: Option<Duration>,
  weak_keys: bool,
  soft_values: bool,
  soft_capacity: Option<u64>,
  record_stats: bool,
  batch_size: u32,
  batch_timeout: Duration,
  batch_workers: usize,
  hasher: H,
}

impl<H> fmt::Debug for CacheBuilder<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("maximum_size", &self.maximum_size)
      .field("concurrency_level", &self.concurrency_level)
      .field("expire_after_write", &self.expire_after_write)
      .field("expire_after_access", &self.expire_after_access)
      .field("soft_values", &self.soft_values)
      .finish_non_exhaustive()
  }
}

impl CacheBuilder<ahash::RandomState> {
  /// Creates a new `CacheBuilder` with default settings: unbounded, no
  /// expiry, stats recording on.
  pub fn new() -> Self {
    Self {
      maximum_size: u64::MAX,
      initial_capacity: 16,
      concurrency_level: (num_cpus::get() * 4).max(1) as u32,
      expire_after_write: None,
      expire_after_access: None,
      weak_keys: false,
      soft_values: false,
      soft_capacity: None,
      record_stats: true,
      batch_size: DEFAULT_BATCH_SIZE,
      batch_timeout: DEFAULT_BATCH_TIMEOUT,
      batch_workers: num_cpus::get().max(1),
      hasher: ahash::RandomState::default(),
    }
  }
}

impl Default for CacheBuilder<ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

impl<H> CacheBuilder<H> {
  /// Sets the maximum number of entries the cache may hold. Capacity is
  /// divided evenly among the segments (each getting at least 1).
  pub fn maximum_size(mut self, maximum_size: u64) -> Self {
    self.maximum_size = maximum_size;
    self
  }

  /// Pre-sizes the hash tables for roughly this many entries.
  pub fn initial_capacity(mut self, initial_capacity: u32) -> Self {
    self.initial_capacity = initial_capacity;
    self
  }

  /// Sets the number of independently locked segments. Rounded up to a
  /// power of two.
  pub fn concurrency_level(mut self, concurrency_level: u32) -> Self {
    self.concurrency_level = concurrency_level;
    self
  }

  /// Entries expire this long after they were written (or rewritten).
  /// A nonzero per-value TTL overrides this for that entry.
  pub fn expire_after_write(mut self, duration: Duration) -> Self {
    self.expire_after_write = Some(duration);
    self
  }

  /// Entries expire this long after they were last read or written.
  pub fn expire_after_access(mut self, duration: Duration) -> Self {
    self.expire_after_access = Some(duration);
    self
  }

  /// Accepted for configuration compatibility. There is no garbage
  /// collector to reclaim weakly keyed entries, so this tier degrades to
  /// strong references and the option is a no-op.
  pub fn weak_keys(mut self) -> Self {
    self.weak_keys = true;
    self
  }

  /// Stores values in the soft tier: entries above the soft capacity
  /// threshold are reclaimed during maintenance with cause `Collected`,
  /// before the hard maximum size is enforced. This models soft-reference
  /// reclamation as explicit capacity pressure.
  pub fn soft_values(mut self) -> Self {
    self.soft_values = true;
    self
  }

  /// Sets the soft-tier threshold. Only meaningful together with
  /// [`soft_values`](Self::soft_values); defaults to half the maximum
  /// size.
  pub fn soft_capacity(mut self, soft_capacity: u64) -> Self {
    self.soft_capacity = Some(soft_capacity);
    self
  }

  /// Enables or disables stats recording. On by default; when off, the
  /// recorder's counters stay at zero.
  pub fn record_stats(mut self, record_stats: bool) -> Self {
    self.record_stats = record_stats;
    self
  }

  /// Sets how many missing keys a single batch load receives.
  pub fn batch_size(mut self, batch_size: u32) -> Self {
    self.batch_size = batch_size;
    self
  }

  /// Sets the absolute deadline a `get_all` call waits for its batches.
  /// Batches unfinished at the deadline are abandoned; their keys come
  /// back as the empty sentinel.
  pub fn batch_timeout(mut self, batch_timeout: Duration) -> Self {
    self.batch_timeout = batch_timeout;
    self
  }

  /// Sets the number of worker threads serving batch loads. The pool is
  /// started lazily on the first `get_all`.
  pub fn batch_workers(mut self, batch_workers: usize) -> Self {
    self.batch_workers = batch_workers;
    self
  }

  /// Sets the hasher shared by the segment maps.
  pub fn hasher<H2>(self, hasher: H2) -> CacheBuilder<H2> {
    CacheBuilder {
      maximum_size: self.maximum_size,
      initial_capacity: self.initial_capacity,
      concurrency_level: self.concurrency_level,
      expire_after_write: self.expire_after_write,
      expire_after_access: self.expire_after_access,
      weak_keys: self.weak_keys,
      soft_values: self.soft_values,
      soft_capacity: self.soft_capacity,
      record_stats: self.record_stats,
      batch_size: self.batch_size,
      batch_timeout: self.batch_timeout,
      batch_workers: self.batch_workers,
      hasher,
    }
  }
}

impl<H> CacheBuilder<H>
where
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds a manually populated [`Cache`].
  pub fn build<V>(self) -> Result<Cache<V, H>, BuildError>
  where
    V: Send + Sync + 'static,
  {
    self.build_inner(None)
  }

  /// Builds a manually populated [`Cache`] with a removal listener.
  pub fn build_with_listener<V, L>(self, listener: L) -> Result<Cache<V, H>, BuildError>
  where
    V: Send + Sync + 'static,
    L: RemovalListener<V> + 'static,
  {
    self.build_inner(Some(Arc::new(listener)))
  }

  /// Builds a [`LoadingCache`] around the given loader.
  pub fn build_with_loader<V, L>(self, loader: L) -> Result<LoadingCache<V, H>, BuildError>
  where
    V: Send + Sync + 'static,
    L: CacheLoader<V> + 'static,
  {
    let cache = self.build_inner(None)?;
    Ok(LoadingCache {
      cache,
      loader: Arc::new(loader),
    })
  }

  /// Builds a [`LoadingCache`] with both a loader and a removal listener.
  pub fn build_loading_with_listener<V, Loader, Listener>(
    self,
    loader: Loader,
    listener: Listener,
  ) -> Result<LoadingCache<V, H>, BuildError>
  where
    V: Send + Sync + 'static,
    Loader: CacheLoader<V> + 'static,
    Listener: RemovalListener<V> + 'static,
  {
    let cache = self.build_inner(Some(Arc::new(listener)))?;
    Ok(LoadingCache {
      cache,
      loader: Arc::new(loader),
    })
  }

  fn build_inner<V>(
    self,
    listener: Option<Arc<dyn RemovalListener<V>>>,
  ) -> Result<Cache<V, H>, BuildError>
  where
    V: Send + Sync + 'static,
  {
    self.validate()?;

    let num_shards = (self.concurrency_level.max(1) as usize).next_power_of_two();
    let store = ShardedStore::new(num_shards, self.initial_capacity as usize, self.hasher.clone());
    let stats = StatsRecorder::new(self.record_stats);
    let notifier = listener.map(Notifier::spawn);

    let shard_capacity = per_shard_capacity(self.maximum_size, num_shards);
    let soft_shard_capacity = if self.soft_values {
      let soft = self.soft_capacity.unwrap_or_else(|| {
        if self.maximum_size == u64::MAX {
          u64::MAX
        } else {
          self.maximum_size / 2
        }
      });
      Some(per_shard_capacity(soft, num_shards))
    } else {
      None
    };
    // Weak keys degrade to strong without a collector; only soft values
    // change the entry tier.
    let strength = if self.soft_values {
      RefStrength::Soft
    } else {
      RefStrength::Strong
    };

    let shared = CacheShared::new(
      store,
      stats,
      notifier,
      shard_capacity,
      soft_shard_capacity,
      self.expire_after_write,
      self.expire_after_access,
      strength,
      self.batch_size as usize,
      self.batch_timeout,
      self.batch_workers,
    );

    Ok(Cache {
      shared: Arc::new(shared),
    })
  }

  /// Validates the builder configuration.
  fn validate(&self) -> Result<(), BuildError> {
    if self.maximum_size == 0
      && self.expire_after_write.is_none()
      && self.expire_after_access.is_none()
    {
      return Err(BuildError::ZeroMaximumSize);
    }
    if self.concurrency_level == 0 {
      return Err(BuildError::ZeroConcurrencyLevel);
    }
    if self.batch_size == 0 {
      return Err(BuildError::ZeroBatchSize);
    }
    if self.batch_timeout.is_zero() {
      return Err(BuildError::ZeroBatchTimeout);
    }
    Ok(())
  }
}

/// The capacity share of a single shard: evenly divided, at least 1.
fn per_shard_capacity(total: u64, num_shards: usize) -> usize {
  if total == u64::MAX {
    return usize::MAX;
  }
  ((total / num_shards as u64).max(1)) as usize
}
