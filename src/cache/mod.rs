//! Loaded dataset cache.
//!
//! # Data Flow
//! ```text
//! DatasetCache::lookup(name, params)
//!     → ConfigStore::snapshot() (name missing? LoadError::NotFound)
//!     → new snapshot generation? evict entries of removed names
//!     → LoaderRegistry::resolve(definition)
//!     → entry for (name, keyed params)
//!         fresh (same definition fingerprint, age < data TTL) → serve
//!         otherwise → loader.load() → replace entry whole
//!                     (failure: keep old entry, return error)
//! ```

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheKey, Staleness};
pub use store::{DatasetCache, LoadError, DEFAULT_MAX_VARIANTS};
