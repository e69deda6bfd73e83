//! Cache manager.

use super::backend::CacheBackend;
use super::key::CacheKey;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// When set every lookup misses and nothing is stored.
    pub disabled: bool,
    pub key_prefix: Option<String>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.disabled = !enabled;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Typed front end over a [`CacheBackend`].
pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    stats: AtomicStats,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        if self.config.disabled {
            return Ok(None);
        }
        let key = self.prefix_key(key);
        match self.backend.lookup(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(v) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(v))
                }
                Err(e) => {
                    // stale shape; treat as a miss so the caller recomputes
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "cached value has unexpected shape");
                    Ok(None)
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        if self.config.disabled {
            return Ok(());
        }
        let value = serde_json::to_value(value)?;
        let key = self.prefix_key(key);
        match self.backend.store(&key, value).await {
            Ok(()) => {
                self.stats.stores.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Return the cached value for `key`, or run `compute`, store its result and return it.
    ///
    /// Errors from `compute` are returned and nothing is stored.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get(key).await? {
            debug!(key = %key, "cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        self.put(key, &value).await?;
        Ok(value)
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn prefix_key(&self, key: &CacheKey) -> CacheKey {
        match self.config.key_prefix {
            Some(ref p) => CacheKey::new(p.as_str()).part(key),
            None => key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::Error;

    fn manager() -> CacheManager {
        CacheManager::new(CacheConfig::new(), Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_get_or_compute_memoizes() {
        let cache = manager();
        let key = CacheKey::valuation("EstiBot", "foo.com");
        let first: f64 = cache.get_or_compute(&key, || async { Ok::<f64, Error>(100.0) }).await.unwrap();
        let second: f64 = cache
            .get_or_compute(&key, || async { Ok::<f64, Error>(1.0) })
            .await
            .unwrap();
        assert_eq!(first, 100.0);
        assert_eq!(second, 100.0);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.stores), (1, 1, 1));
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_compute_error_is_not_cached() {
        let cache = manager();
        let key = CacheKey::from("k");
        let err = cache
            .get_or_compute::<u32, _, _>(&key, || async { Err::<u32, _>(Error::runtime("down")) })
            .await;
        assert!(err.is_err());
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_misses() {
        let cache = CacheManager::new(
            CacheConfig::new().with_enabled(false),
            Arc::new(MemoryCache::new()),
        );
        let key = CacheKey::from("k");
        cache.put(&key, &1u32).await.unwrap();
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_applied() {
        let backend = Arc::new(MemoryCache::new());
        let cache = CacheManager::new(CacheConfig::new().with_key_prefix("v1"), backend.clone());
        cache.put(&CacheKey::from("k"), &"x").await.unwrap();
        assert!(backend.lookup(&CacheKey::from("v1:k")).await.unwrap().is_some());
    }
}
