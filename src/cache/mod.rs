//! Disk-backed key/value cache used to memoize expensive lookups across runs.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Typed get/put, memoization and hit/miss statistics |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`JsonFileCache`] | One JSON object on disk, rewritten atomically on store |
//! | [`MemoryCache`] | In-process map, for tests and throwaway runs |
//! | [`CacheKey`] | `namespace:part:part` key composition |
//!
//! There is no TTL or eviction: entries live until the file is removed.
//!
//! ```rust,no_run
//! use domain_pipeline::cache::{CacheConfig, CacheKey, CacheManager, JsonFileCache};
//! use std::sync::Arc;
//!
//! # async fn demo() -> domain_pipeline::Result<()> {
//! let backend = JsonFileCache::open("data/valuation_cache.json").await?;
//! let cache = CacheManager::new(CacheConfig::new(), Arc::new(backend));
//! let key = CacheKey::valuation("EstiBot", "example.com");
//! let value: f64 = cache.get_or_compute(&key, || async { Ok(100.0) }).await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, JsonFileCache, MemoryCache};
pub use key::CacheKey;
pub use manager::{CacheConfig, CacheManager, CacheStats};
