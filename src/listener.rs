use crate::key::{CacheKey, CacheValue};

use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
  /// The entry was manually invalidated.
  Explicit,
  /// The entry was overwritten by a `put` or a completed load.
  Replaced,
  /// The entry's write-age or access-age expiry elapsed.
  Expired,
  /// The entry was evicted to keep the cache within its maximum size.
  Size,
  /// The entry was reclaimed from the soft tier under capacity pressure.
  Collected,
}

impl RemovalCause {
  /// `true` when the entry left the cache for a reason other than a user
  /// action (`put` / `invalidate`).
  pub fn was_evicted(&self) -> bool {
    matches!(
      self,
      RemovalCause::Expired | RemovalCause::Size | RemovalCause::Collected
    )
  }
}

impl fmt::Display for RemovalCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalCause::Explicit => write!(f, "manually invalidated"),
      RemovalCause::Replaced => write!(f, "replaced by a newer value"),
      RemovalCause::Expired => write!(f, "expired (write-age or access-age)"),
      RemovalCause::Size => write!(f, "evicted due to capacity"),
      RemovalCause::Collected => write!(f, "reclaimed from the soft tier"),
    }
  }
}

/// A listener that can be registered with the cache to receive a
/// notification after an entry's removal has been committed.
///
/// `on_removal` runs on a dedicated background thread so a slow listener
/// cannot block cache operations. Notifications for the same key are
/// delivered in causal order.
pub trait RemovalListener<V>: Send + Sync {
  fn on_removal(&self, key: CacheKey, value: Arc<CacheValue<V>>, cause: RemovalCause);
}
