use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::ledger::EvictionLedger;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<H: BuildHasher>(hasher: &H, key: &CacheKey) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// One independently locked segment of the cache.
///
/// Lock order: the ledger lock may be acquired while holding the map lock,
/// never the reverse. Read paths take the ledger lock alone to bump
/// recency, so eviction candidates picked from the ledger are re-checked
/// against the map before removal.
pub(crate) struct Shard<V, H> {
  pub(crate) map: RwLock<HashMap<CacheKey, Arc<CacheEntry<V>>, H>>,
  pub(crate) ledger: Mutex<EvictionLedger>,
  /// Gate for opportunistic inline maintenance: `try_lock` only, so at
  /// most one caller pays the maintenance cost at a time.
  pub(crate) maintenance_lock: Mutex<()>,
}

/// A cache store that is partitioned into multiple, independently locked
/// shards.
///
/// This design allows for high concurrency by ensuring that operations on
/// different keys are unlikely to contend for the same lock.
pub(crate) struct ShardedStore<V, H> {
  pub(crate) shards: Box<[CachePadded<Shard<V, H>>]>,
  pub(crate) hasher: H,
}

impl<V, H> fmt::Debug for ShardedStore<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<V, H> ShardedStore<V, H>
where
  H: BuildHasher + Clone,
{
  /// Creates a new `ShardedStore`. `num_shards` must be a power of two;
  /// the builder guarantees this.
  pub(crate) fn new(num_shards: usize, initial_capacity: usize, hasher: H) -> Self {
    let per_shard_capacity = initial_capacity / num_shards;
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      shards.push(CachePadded::new(Shard {
        map: RwLock::new(HashMap::with_capacity_and_hasher(
          per_shard_capacity,
          hasher.clone(),
        )),
        ledger: Mutex::new(EvictionLedger::new()),
        maintenance_lock: Mutex::new(()),
      }));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn shard_index(&self, key: &CacheKey) -> usize {
    let hash = hash_key(&self.hasher, key);
    // Shard count is a power of two, so masking is equivalent to modulo.
    hash as usize & (self.shards.len() - 1)
  }

  /// Returns the shard owning the given key.
  #[inline]
  pub(crate) fn shard_for(&self, key: &CacheKey) -> &Shard<V, H> {
    &self.shards[self.shard_index(key)]
  }

  /// Returns an iterator over all shards, for cross-shard operations like
  /// `clear`. No lock spans two shards, so iteration is not an atomic
  /// snapshot.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard<V, H>> {
    self.shards.iter().map(|padded| &**padded)
  }
}
