use std::fmt;
use std::sync::Arc;

/// The boxed error type loaders are allowed to return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The cache was configured with a maximum size of zero and no
  /// expiration policy, which would make every insert a no-op.
  ZeroMaximumSize,
  /// The cache was configured with a concurrency level of zero.
  ZeroConcurrencyLevel,
  /// The batch size for bulk loads cannot be zero.
  ZeroBatchSize,
  /// The batch timeout for bulk loads cannot be zero.
  ZeroBatchTimeout,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroMaximumSize => {
        write!(f, "maximum size cannot be zero without an expiration policy")
      }
      BuildError::ZeroConcurrencyLevel => write!(f, "concurrency level cannot be zero"),
      BuildError::ZeroBatchSize => write!(f, "batch size cannot be zero"),
      BuildError::ZeroBatchTimeout => write!(f, "batch timeout cannot be zero"),
    }
  }
}

impl std::error::Error for BuildError {}

/// Errors surfaced by a load-through lookup.
///
/// A load failure is broadcast to every caller waiting on the same key and
/// is never cached: the single-flight slot is torn down before the
/// broadcast, so the next caller retries the load.
#[derive(Debug, Clone)]
pub enum LoadError {
  /// The loader returned an error.
  Failed(Arc<BoxError>),
  /// The loader panicked. The panic is contained so that waiters on the
  /// same key are woken rather than stranded.
  LoaderPanicked,
}

impl fmt::Display for LoadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoadError::Failed(err) => write!(f, "loader failed: {}", err),
      LoadError::LoaderPanicked => write!(f, "loader panicked"),
    }
  }
}

impl std::error::Error for LoadError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      LoadError::Failed(err) => Some(err.as_ref().as_ref()),
      LoadError::LoaderPanicked => None,
    }
  }
}
