use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// The internal, lock-free stats recorder for the cache.
///
/// All counters are padded atomics so that hot-path updates on different
/// cores do not contend on a cache line. When `record_stats(false)` is
/// configured every recording method is a no-op.
#[derive(Debug)]
pub(crate) struct StatsRecorder {
  enabled: bool,
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  load_successes: CachePadded<AtomicU64>,
  load_failures: CachePadded<AtomicU64>,
  total_load_time_nanos: CachePadded<AtomicU64>,
  evictions: CachePadded<AtomicU64>,
}

impl StatsRecorder {
  pub(crate) fn new(enabled: bool) -> Self {
    Self {
      enabled,
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      load_successes: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      total_load_time_nanos: CachePadded::new(AtomicU64::new(0)),
      evictions: CachePadded::new(AtomicU64::new(0)),
    }
  }

  #[inline]
  pub(crate) fn record_hits(&self, count: u64) {
    if self.enabled {
      self.hits.fetch_add(count, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_misses(&self, count: u64) {
    if self.enabled {
      self.misses.fetch_add(count, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_load_success(&self, load_time_nanos: u64) {
    if self.enabled {
      self.load_successes.fetch_add(1, Ordering::Relaxed);
      self
        .total_load_time_nanos
        .fetch_add(load_time_nanos, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_load_failure(&self, load_time_nanos: u64) {
    if self.enabled {
      self.load_failures.fetch_add(1, Ordering::Relaxed);
      self
        .total_load_time_nanos
        .fetch_add(load_time_nanos, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn record_eviction(&self) {
    if self.enabled {
      self.evictions.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the counters.
  pub(crate) fn snapshot(&self) -> CacheStats {
    CacheStats {
      hit_count: self.hits.load(Ordering::Relaxed),
      miss_count: self.misses.load(Ordering::Relaxed),
      load_success_count: self.load_successes.load(Ordering::Relaxed),
      load_failure_count: self.load_failures.load(Ordering::Relaxed),
      total_load_time_nanos: self.total_load_time_nanos.load(Ordering::Relaxed),
      eviction_count: self.evictions.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time, public snapshot of the cache's counters.
///
/// All counters are monotonic over the life of the cache. A snapshot is a
/// consistent copy of each counter, not a live view.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheStats {
  /// The number of lookups that found a live entry.
  pub hit_count: u64,
  /// The number of lookups that found nothing (absent, expired, reclaimed).
  pub miss_count: u64,
  /// The number of loads that completed successfully.
  pub load_success_count: u64,
  /// The number of loads that returned an error or panicked.
  pub load_failure_count: u64,
  /// Total wall-clock time spent inside loaders, in nanoseconds.
  pub total_load_time_nanos: u64,
  /// The number of entries evicted by capacity, expiry, or the soft tier.
  pub eviction_count: u64,
}

impl CacheStats {
  /// The ratio of hits to total lookups, or 1.0 when there were none.
  pub fn hit_rate(&self) -> f64 {
    let total = self.hit_count + self.miss_count;
    if total == 0 {
      1.0
    } else {
      self.hit_count as f64 / total as f64
    }
  }

  /// The average time spent per load attempt, in nanoseconds.
  pub fn average_load_penalty_nanos(&self) -> f64 {
    let loads = self.load_success_count + self.load_failure_count;
    if loads == 0 {
      0.0
    } else {
      self.total_load_time_nanos as f64 / loads as f64
    }
  }
}

impl fmt::Debug for CacheStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStats")
      .field("hit_count", &self.hit_count)
      .field("miss_count", &self.miss_count)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate() * 100.0))
      .field("load_success_count", &self.load_success_count)
      .field("load_failure_count", &self.load_failure_count)
      .field("total_load_time_nanos", &self.total_load_time_nanos)
      .field("eviction_count", &self.eviction_count)
      .finish()
  }
}
