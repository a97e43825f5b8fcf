use crate::entry::{CacheEntry, RefStrength};
use crate::error::{BoxError, LoadError};
use crate::key::{CacheKey, CacheValue};
use crate::ledger::EvictionLedger;
use crate::listener::RemovalCause;
use crate::loader::LoadFuture;
use crate::metrics::StatsRecorder;
use crate::store::{hash_key, Shard, ShardedStore};
use crate::task::batch_pool::BatchPool;
use crate::task::notifier::{NotificationSender, Notifier};

use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// The max number of stale entries examined per inline maintenance run.
/// Maintenance piggybacks on write operations, so the bound keeps any
/// single operation's pause small.
const MAINTENANCE_SCAN_LIMIT: usize = 8;

/// The function a batch of missing keys is handed to. Returns the loaded
/// values; a key omitted from the map counts as failed for this call.
pub(crate) type BatchLoadFn<V> =
  Arc<dyn Fn(&[CacheKey]) -> Result<HashMap<CacheKey, CacheValue<V>>, BoxError> + Send + Sync>;

type BatchResult<V> = (
  Result<Result<HashMap<CacheKey, CacheValue<V>>, BoxError>, ()>,
  u64,
);

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<V, H> {
  pub(crate) store: ShardedStore<V, H>,
  pub(crate) stats: StatsRecorder,
  /// Single-flight slots, striped like the store. A slot is installed and
  /// torn down under its stripe lock, so two loads for one key cannot
  /// coexist.
  pending_loads: Box<[Mutex<HashMap<CacheKey, Arc<LoadFuture<V>>>>]>,
  notification_sender: Option<NotificationSender<V>>,
  _notifier: Option<Notifier>,
  /// Worker pool for batch loads, started on first use.
  batch_pool: OnceCell<BatchPool>,
  pub(crate) shard_capacity: usize,
  pub(crate) soft_shard_capacity: Option<usize>,
  pub(crate) expire_after_write: Option<Duration>,
  pub(crate) expire_after_access: Option<Duration>,
  pub(crate) strength: RefStrength,
  pub(crate) batch_size: usize,
  pub(crate) batch_timeout: Duration,
  pub(crate) batch_workers: usize,
}

impl<V, H> fmt::Debug for CacheShared<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("shard_capacity", &self.shard_capacity)
      .field("expire_after_write", &self.expire_after_write)
      .field("expire_after_access", &self.expire_after_access)
      .field("stats", &self.stats.snapshot())
      .finish_non_exhaustive()
  }
}

impl<V, H> CacheShared<V, H>
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn new(
    store: ShardedStore<V, H>,
    stats: StatsRecorder,
    notifier: Option<(Notifier, NotificationSender<V>)>,
    shard_capacity: usize,
    soft_shard_capacity: Option<usize>,
    expire_after_write: Option<Duration>,
    expire_after_access: Option<Duration>,
    strength: RefStrength,
    batch_size: usize,
    batch_timeout: Duration,
    batch_workers: usize,
  ) -> Self {
    let num_stripes = store.shards.len();
    let mut pending_loads = Vec::with_capacity(num_stripes);
    for _ in 0..num_stripes {
      pending_loads.push(Mutex::new(HashMap::new()));
    }

    let (notifier, notification_sender) = match notifier {
      Some((n, tx)) => (Some(n), Some(tx)),
      None => (None, None),
    };

    Self {
      store,
      stats,
      pending_loads: pending_loads.into_boxed_slice(),
      notification_sender,
      _notifier: notifier,
      batch_pool: OnceCell::new(),
      shard_capacity,
      soft_shard_capacity,
      expire_after_write,
      expire_after_access,
      strength,
      batch_size,
      batch_timeout,
      batch_workers,
    }
  }

  #[inline]
  fn pending_stripe(&self, key: &CacheKey) -> &Mutex<HashMap<CacheKey, Arc<LoadFuture<V>>>> {
    let hash = hash_key(&self.store.hasher, key);
    &self.pending_loads[hash as usize & (self.pending_loads.len() - 1)]
  }

  /// Looks up a live (present, not expired) entry. Does not record stats
  /// or touch recency; callers do that once they know how to account for
  /// the outcome.
  fn lookup_live(&self, key: &CacheKey) -> Option<Arc<CacheEntry<V>>> {
    let shard = self.store.shard_for(key);
    let guard = shard.map.read();
    guard
      .get(key)
      .filter(|entry| !entry.is_expired(self.expire_after_access))
      .cloned()
  }

  /// Common bookkeeping for a read hit: access time, recency order, stats.
  fn on_hit(&self, key: &CacheKey, entry: &Arc<CacheEntry<V>>) {
    if self.expire_after_access.is_some() {
      entry.touch();
    }
    let shard = self.store.shard_for(key);
    shard.ledger.lock().on_access(key);
    self.stats.record_hits(1);
  }

  /// `get_if_present`: never loads; absent, expired, and reclaimed entries
  /// all look the same from here. A pending load is also "absent".
  pub(crate) fn get_if_present(&self, key: &CacheKey) -> Option<Arc<CacheValue<V>>> {
    match self.lookup_live(key) {
      Some(entry) => {
        self.on_hit(key, &entry);
        Some(entry.value())
      }
      None => {
        self.stats.record_misses(1);
        None
      }
    }
  }

  /// Unconditionally installs `value` for `key`. A displaced live entry is
  /// reported as `Replaced`; a displaced entry that had already expired is
  /// reported as `Expired`.
  pub(crate) fn insert(&self, key: CacheKey, value: CacheValue<V>) -> Arc<CacheValue<V>> {
    let entry = Arc::new(CacheEntry::new(
      value,
      self.expire_after_write,
      self.expire_after_access,
      self.strength,
    ));
    let value_arc = entry.value();

    let shard = self.store.shard_for(&key);
    {
      let mut guard = shard.map.write();
      let old_entry = guard.insert(key.clone(), entry);

      {
        let mut ledger = shard.ledger.lock();
        ledger.on_insert(&key);
        self.evict_over_capacity(&mut guard, &mut ledger);
      }

      if let Some(old) = old_entry {
        let cause = if old.is_expired(self.expire_after_access) {
          RemovalCause::Expired
        } else {
          RemovalCause::Replaced
        };
        if cause == RemovalCause::Expired {
          self.stats.record_eviction();
        }
        if let Some(tx) = &self.notification_sender {
          tx.send(key.clone(), old.value(), cause);
        }
      }
    }

    self.run_opportunistic_maintenance(shard);
    value_arc
  }

  /// Removes `key`, reporting `cause`. Returns the removed value.
  pub(crate) fn remove(&self, key: &CacheKey, cause: RemovalCause) -> Option<Arc<CacheValue<V>>> {
    let shard = self.store.shard_for(key);
    let mut guard = shard.map.write();
    let removed = guard.remove(key)?;
    shard.ledger.lock().on_remove(key);
    if cause.was_evicted() {
      self.stats.record_eviction();
    }
    let value = removed.value();
    if let Some(tx) = &self.notification_sender {
      tx.send(key.clone(), value.clone(), cause);
    }
    Some(value)
  }

  /// Removes every entry, reporting `Explicit` for each.
  pub(crate) fn clear(&self) {
    for shard in self.store.iter_shards() {
      let mut guard = shard.map.write();
      let mut ledger = shard.ledger.lock();
      if let Some(tx) = &self.notification_sender {
        for (key, entry) in guard.iter() {
          tx.send(key.clone(), entry.value(), RemovalCause::Explicit);
        }
      }
      guard.clear();
      ledger.clear();
    }
  }

  pub(crate) fn len(&self) -> usize {
    self
      .store
      .iter_shards()
      .map(|shard| shard.map.read().len())
      .sum()
  }

  /// Evicts recency-tail entries until the shard is back at capacity.
  /// Both locks are already held; victims picked from the ledger are
  /// re-checked against the map.
  fn evict_over_capacity(
    &self,
    guard: &mut HashMap<CacheKey, Arc<CacheEntry<V>>, H>,
    ledger: &mut EvictionLedger,
  ) {
    while ledger.len() > self.shard_capacity {
      let Some(victim) = ledger.pop_lru() else {
        break;
      };
      if let Some(dead) = guard.remove(&victim) {
        self.stats.record_eviction();
        if let Some(tx) = &self.notification_sender {
          tx.send(victim, dead.value(), RemovalCause::Size);
        }
      }
    }
  }

  /// Inline, amortized maintenance: runs only when the shard's gate is
  /// free, and examines a bounded number of entries.
  pub(crate) fn run_opportunistic_maintenance(&self, shard: &Shard<V, H>) {
    if let Some(_gate) = shard.maintenance_lock.try_lock() {
      self.perform_shard_maintenance(shard);
    }
  }

  fn perform_shard_maintenance(&self, shard: &Shard<V, H>) {
    let mut guard = shard.map.write();
    let mut ledger = shard.ledger.lock();

    // Write-expiry scan, oldest write first. Per-entry TTL overrides make
    // this worthwhile even without a cache-wide write expiry.
    let now = crate::time::now_nanos();
    for key in ledger.oldest_written(MAINTENANCE_SCAN_LIMIT) {
      let Some(entry) = guard.get(&key) else {
        // The ledger lagged behind the map; drop the orphan.
        ledger.on_remove(&key);
        continue;
      };
      if entry.is_expired(self.expire_after_access) {
        if let Some(dead) = guard.remove(&key) {
          ledger.on_remove(&key);
          self.stats.record_eviction();
          if let Some(tx) = &self.notification_sender {
            tx.send(key, dead.value(), RemovalCause::Expired);
          }
        }
        continue;
      }
      // Entries come oldest write first: once one without a TTL override
      // is still inside the cache-wide TTL, the younger remainder is too.
      if let Some(ttl) = self.expire_after_write {
        if entry.value().ttl().is_zero()
          && now.saturating_sub(entry.written_at()) < ttl.as_nanos() as u64
        {
          break;
        }
      }
    }

    // Access-expiry scan, least recent first. Write-stale entries missed
    // above (younger writes) still fall out here via `is_expired`.
    if self.expire_after_access.is_some() {
      for key in ledger.least_recent(MAINTENANCE_SCAN_LIMIT) {
        let expired = match guard.get(&key) {
          Some(entry) => entry.is_expired(self.expire_after_access),
          None => {
            ledger.on_remove(&key);
            continue;
          }
        };
        if expired {
          if let Some(dead) = guard.remove(&key) {
            ledger.on_remove(&key);
            self.stats.record_eviction();
            if let Some(tx) = &self.notification_sender {
              tx.send(key, dead.value(), RemovalCause::Expired);
            }
          }
        }
      }
    }

    // Soft tier: reclaim LRU entries above the soft threshold before the
    // hard limit is in play.
    if let Some(soft_capacity) = self.soft_shard_capacity {
      while ledger.len() > soft_capacity {
        let Some(victim) = ledger.pop_lru() else {
          break;
        };
        if let Some(dead) = guard.remove(&victim) {
          let cause = if dead.strength() == RefStrength::Soft {
            RemovalCause::Collected
          } else {
            RemovalCause::Size
          };
          self.stats.record_eviction();
          if let Some(tx) = &self.notification_sender {
            tx.send(victim, dead.value(), cause);
          }
        }
      }
    }

    self.evict_over_capacity(&mut guard, &mut ledger);
  }

  /// Single-key load-through with single-flight coordination.
  ///
  /// The first caller for a missing key becomes the loader and runs
  /// `loader_fn` on its own thread; racers park on the shared slot and
  /// receive the broadcast outcome. Failures are broadcast but never
  /// cached: the slot is removed before the broadcast, so the next call
  /// retries.
  pub(crate) fn load_one<F>(
    &self,
    key: &CacheKey,
    loader_fn: F,
  ) -> Result<Arc<CacheValue<V>>, LoadError>
  where
    F: FnOnce(&CacheKey) -> Result<CacheValue<V>, BoxError>,
  {
    // Optimistic read.
    if let Some(entry) = self.lookup_live(key) {
      self.on_hit(key, &entry);
      return Ok(entry.value());
    }

    let stripe = self.pending_stripe(key);
    let future = {
      let mut pending = stripe.lock();
      if let Some(existing) = pending.get(key) {
        // Another caller is loading this key; wait for its outcome.
        let existing = existing.clone();
        drop(pending);
        self.stats.record_misses(1);
        return existing.wait();
      }
      let future = Arc::new(LoadFuture::new());
      pending.insert(key.clone(), future.clone());
      future
    };

    // We are the loader. Re-check the map once: a put or a completed load
    // may have landed between the optimistic read and installing the slot.
    if let Some(entry) = self.lookup_live(key) {
      stripe.lock().remove(key);
      let value = entry.value();
      future.complete(value.clone());
      self.on_hit(key, &entry);
      return Ok(value);
    }

    self.stats.record_misses(1);
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| loader_fn(key)));
    let load_nanos = started.elapsed().as_nanos() as u64;

    match outcome {
      Ok(Ok(value)) => {
        let value_arc = self.insert(key.clone(), value);
        stripe.lock().remove(key);
        future.complete(value_arc.clone());
        self.stats.record_load_success(load_nanos);
        Ok(value_arc)
      }
      Ok(Err(err)) => {
        let error = LoadError::Failed(Arc::new(err));
        stripe.lock().remove(key);
        future.fail(error.clone());
        self.stats.record_load_failure(load_nanos);
        Err(error)
      }
      Err(_) => {
        let error = LoadError::LoaderPanicked;
        stripe.lock().remove(key);
        future.fail(error.clone());
        self.stats.record_load_failure(load_nanos);
        Err(error)
      }
    }
  }

  /// Batch load-through.
  ///
  /// Present keys are served from the map. Missing keys are pre-filled in
  /// the output with a call-scoped sentinel, chunked into batches of
  /// `batch_size`, and dispatched to the worker pool. Results are merged
  /// until `batch_timeout` elapses; batches still running at the deadline
  /// are abandoned and their keys stay sentineled (and uncached, so a later
  /// call retries them). One batch's failure never affects another's keys.
  pub(crate) fn get_all_batched(
    &self,
    keys: Vec<CacheKey>,
    batch_loader: BatchLoadFn<V>,
  ) -> HashMap<CacheKey, Arc<CacheValue<V>>> {
    let mut out = HashMap::with_capacity(keys.len());
    let mut missing: Vec<CacheKey> = Vec::new();

    for key in keys {
      if out.contains_key(&key) || missing.contains(&key) {
        continue;
      }
      match self.lookup_live(&key) {
        Some(entry) => {
          self.on_hit(&key, &entry);
          out.insert(key, entry.value());
        }
        None => missing.push(key),
      }
    }
    // Hits were recorded by on_hit; misses are recorded in bulk.
    self.stats.record_misses(missing.len() as u64);

    if missing.is_empty() {
      return out;
    }

    // Sentinel-fill every missing key up front so a failed or timed-out
    // batch leaves a well-defined "failed to load" marker in the output
    // without poisoning the cache.
    let sentinel = Arc::new(CacheValue::empty());
    for key in &missing {
      out.insert(key.clone(), sentinel.clone());
    }

    let pool = self
      .batch_pool
      .get_or_init(|| BatchPool::spawn(self.batch_workers));

    let batches: Vec<Vec<CacheKey>> = missing
      .chunks(self.batch_size)
      .map(|chunk| chunk.to_vec())
      .collect();
    let num_batches = batches.len();

    let (tx, rx) = channel::bounded::<(Vec<CacheKey>, BatchResult<V>)>(num_batches);
    for batch in batches {
      let tx = tx.clone();
      let batch_loader = batch_loader.clone();
      pool.submit(move || {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| batch_loader(&batch)));
        let load_nanos = started.elapsed().as_nanos() as u64;
        // If the caller gave up at its deadline the receiver is gone and
        // this send fails; the late result is discarded, never merged.
        let _ = tx.send((batch, (outcome.map_err(|_| ()), load_nanos)));
      });
    }
    drop(tx);

    let deadline = Instant::now() + self.batch_timeout;
    let mut received = 0;
    while received < num_batches {
      let (batch, (outcome, load_nanos)) = match rx.recv_deadline(deadline) {
        Ok(result) => result,
        Err(_) => break, // Deadline hit; abandon the stragglers.
      };
      received += 1;

      match outcome {
        Ok(Ok(mut loaded)) => {
          self.stats.record_load_success(load_nanos);
          for key in &batch {
            if let Some(value) = loaded.remove(key) {
              let value_arc = self.insert(key.clone(), value);
              out.insert(key.clone(), value_arc);
            }
            // Keys the loader omitted stay sentineled for this call.
          }
        }
        Ok(Err(_)) | Err(()) => {
          // Whole-batch failure: its keys stay sentineled and uncached.
          self.stats.record_load_failure(load_nanos);
        }
      }
    }

    out
  }
}
