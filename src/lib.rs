//! A concurrent, in-process loading cache.
//!
//! # Features
//! - **High Concurrency**: Built with a sharded architecture to minimize lock contention.
//! - **Load-Through**: Missing values are computed on demand by a per-call
//!   closure or a configured [`CacheLoader`].
//! - **Single-Flight**: Concurrent lookups for the same key share one
//!   computation; failures are broadcast but never cached.
//! - **Batch Loads**: `get_all` groups missing keys into batches, runs them
//!   on a worker pool, and bounds the wait with a hard deadline.
//! - **Eviction**: Maximum size (approximate LRU), write-age and access-age
//!   expiry, and a soft tier reclaimed under capacity pressure. All of it
//!   is maintained inline, with no dedicated background eviction thread.
//! - **Observability**: Removal notifications with a cause, and a
//!   [`CacheStats`] counter snapshot.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod key;
pub mod listener;
pub mod loader;
pub mod metrics;

// Internal, crate-only modules
mod entry;
mod ledger;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use error::{BoxError, BuildError, LoadError};
pub use handles::{Cache, LoadingCache};
pub use key::{CacheKey, CacheValue};
pub use listener::{RemovalCause, RemovalListener};
pub use loader::CacheLoader;
pub use metrics::CacheStats;
