use std::time::Duration;

/// The composite key used by the cache.
///
/// A `CacheKey` is a pair of opaque string identifiers. Two keys are
/// interchangeable iff both fields compare equal; hashing covers both
/// fields so that keys differing in either part land independently.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
  primary: String,
  secondary: String,
}

impl CacheKey {
  pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
    Self {
      primary: primary.into(),
      secondary: secondary.into(),
    }
  }

  pub fn primary(&self) -> &str {
    &self.primary
  }

  pub fn secondary(&self) -> &str {
    &self.secondary
  }
}

/// An immutable wrapper around a cached payload.
///
/// The payload is optional: a `CacheValue` with no payload is the
/// **sentinel** that `get_all` hands back for keys whose batch load failed
/// or timed out. Sentinels are call-scoped; they are never written into the
/// cache, so a later call retries the load.
///
/// `ttl` is a per-entry override for the cache-wide write-expiry policy.
/// `Duration::ZERO` means "use the default policy".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheValue<V> {
  value: Option<V>,
  ttl: Duration,
}

impl<V> CacheValue<V> {
  /// Creates a value that follows the cache-wide expiry policy.
  pub fn new(value: V) -> Self {
    Self {
      value: Some(value),
      ttl: Duration::ZERO,
    }
  }

  /// Creates a value with its own time-to-live, overriding the cache-wide
  /// write-expiry policy for this entry only.
  pub fn with_ttl(value: V, ttl: Duration) -> Self {
    Self {
      value: Some(value),
      ttl,
    }
  }

  /// The sentinel: no payload, no TTL override.
  pub fn empty() -> Self {
    Self {
      value: None,
      ttl: Duration::ZERO,
    }
  }

  /// Returns `true` for the sentinel produced by a failed or timed-out
  /// batch load. Callers must treat this as "failed to load".
  pub fn is_empty(&self) -> bool {
    self.value.is_none()
  }

  pub fn value(&self) -> Option<&V> {
    self.value.as_ref()
  }

  pub fn into_value(self) -> Option<V> {
    self.value
  }

  /// The per-entry TTL override. `Duration::ZERO` means the cache-wide
  /// policy applies.
  pub fn ttl(&self) -> Duration {
    self.ttl
  }
}
