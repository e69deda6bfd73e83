//! Shared handles passed to every job.

use crate::broadcast::{event_message, BroadcastReport, Broadcaster};
use crate::cache::{CacheConfig, CacheManager, JsonFileCache, MemoryCache};
use crate::config::Settings;
use crate::store::{MemoryStore, Store};
use crate::Result;
use std::sync::Arc;

/// Everything a job needs, built once at startup.
pub struct AppContext {
    pub settings: Settings,
    pub store: Arc<dyn Store>,
    pub cache: Arc<CacheManager>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        cache: Arc<CacheManager>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            settings,
            store,
            cache,
            broadcaster,
        }
    }

    /// Memory store, JSON file cache at `settings.cache_path`, empty broadcaster.
    pub async fn from_settings(settings: Settings) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&settings.data_dir).await?;
        let backend = JsonFileCache::open(&settings.cache_path).await?;
        let cache = CacheManager::new(CacheConfig::new(), Arc::new(backend));
        Ok(Arc::new(Self::new(
            settings,
            Arc::new(MemoryStore::new()),
            Arc::new(cache),
            Arc::new(Broadcaster::new()),
        )))
    }

    /// Fully in-memory context; nothing touches disk until a job exports a file.
    pub fn in_memory(settings: Settings) -> Arc<Self> {
        let cache = CacheManager::new(CacheConfig::new(), Arc::new(MemoryCache::new()));
        Arc::new(Self::new(
            settings,
            Arc::new(MemoryStore::new()),
            Arc::new(cache),
            Arc::new(Broadcaster::new()),
        ))
    }

    /// Push a `{"type": kind, "data": data}` event to live subscribers.
    pub async fn notify(&self, kind: &str, data: serde_json::Value) -> BroadcastReport {
        self.broadcaster.broadcast(&event_message(kind, data)).await
    }
}
