//! Named, versioned response cache.
//!
//! This module provides the storage half of the proxy:
//! - Stores responses keyed by request identity (method + URL)
//! - Keeps responses in named stores so a new version can retire old ones
//! - Serves cache-first lookups with an offline fallback

#[cfg(test)]
pub(crate) mod faulty;
mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, OfflineFallback};
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, CachedResponse, RequestKey};
