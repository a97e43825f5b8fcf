use crate::key::CacheValue;
use crate::time;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The reference strength of an entry.
///
/// `Soft` entries belong to the reclamation tier: they are evicted under
/// capacity pressure before the hard limit is enforced. There is no
/// automatic memory reclamation to cooperate with, so `Weak` degrades to
/// `Strong` and is not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefStrength {
  Strong,
  Soft,
}

/// A container for a value in the cache, holding all necessary metadata.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The user's value, wrapped in an Arc for shared ownership.
  value: Arc<CacheValue<V>>,
  /// The write timestamp in nanoseconds since the cache epoch.
  written_at: u64,
  /// The expiration timestamp in nanoseconds. 0 means no write expiry.
  expires_at: u64,
  /// The last access timestamp in nanoseconds. 0 means no access expiry.
  last_accessed: AtomicU64,
  /// Which reclamation tier this entry belongs to.
  strength: RefStrength,
}

impl<V> CacheEntry<V> {
  /// Creates a new `CacheEntry`.
  ///
  /// A nonzero TTL on the value overrides `ttl_write` for this entry.
  pub(crate) fn new(
    value: CacheValue<V>,
    ttl_write: Option<Duration>,
    ttl_access: Option<Duration>,
    strength: RefStrength,
  ) -> Self {
    let now = time::now_nanos();
    let effective_ttl = if value.ttl() > Duration::ZERO {
      Some(value.ttl())
    } else {
      ttl_write
    };
    let expires_at = effective_ttl.map_or(0, |d| now.saturating_add(d.as_nanos() as u64));
    let last_accessed = ttl_access.map_or(0, |_| now);

    Self {
      value: Arc::new(value),
      written_at: now,
      expires_at,
      last_accessed: AtomicU64::new(last_accessed),
      strength,
    }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<CacheValue<V>> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn written_at(&self) -> u64 {
    self.written_at
  }

  #[inline]
  pub(crate) fn strength(&self) -> RefStrength {
    self.strength
  }

  /// Updates the last accessed timestamp to the current time.
  /// This is a cheap atomic store operation.
  #[inline]
  pub(crate) fn touch(&self) {
    self.last_accessed.store(time::now_nanos(), Ordering::Relaxed);
  }

  /// Checks if the entry is expired by write-age or access-age.
  #[inline]
  pub(crate) fn is_expired(&self, ttl_access: Option<Duration>) -> bool {
    let now = time::now_nanos();

    if self.expires_at > 0 && now >= self.expires_at {
      return true;
    }

    if let Some(idle) = ttl_access {
      let last_accessed = self.last_accessed.load(Ordering::Relaxed);
      if now >= last_accessed.saturating_add(idle.as_nanos() as u64) {
        return true;
      }
    }

    false
  }
}
