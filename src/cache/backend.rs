//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Value>>;
    async fn store(&self, key: &CacheKey, value: Value) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::runtime_with_context("cache lock poisoned", ErrorContext::new().with_source("cache"))
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Value>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key.as_str()).cloned())
    }
    async fn store(&self, key: &CacheKey, value: Value) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.as_str().to_string(), value);
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| poisoned())?.len())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Whole-file JSON object cache.
///
/// The file is read once on open and rewritten after every store. Writes go
/// to a sibling temp file that is renamed over the original, so a crash
/// mid-write leaves the previous contents intact.
pub struct JsonFileCache {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileCache {
    /// Open `path`, creating it (and its parent directory) as `{}` if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(raw) => parse_object(&path, &raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, b"{}").await?;
                debug!(path = %path.display(), "created empty cache file");
                Map::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &Map<String, Value>) -> Result<()> {
        let body = serde_json::to_vec_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn parse_object(path: &Path, raw: &[u8]) -> Result<Map<String, Value>> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::configuration_with_context(
            "cache file must contain a JSON object",
            ErrorContext::new()
                .with_field_path(path.display().to_string())
                .with_source("cache"),
        )),
    }
}

#[async_trait]
impl CacheBackend for JsonFileCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key.as_str()).cloned())
    }
    async fn store(&self, key: &CacheKey, value: Value) -> Result<()> {
        // lock held across the write so concurrent stores hit disk in order
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.as_str().to_string(), value);
        if let Err(e) = self.persist(&entries).await {
            // keep memory in line with what is on disk
            match previous {
                Some(old) => {
                    entries.insert(key.as_str().to_string(), old);
                }
                None => {
                    entries.remove(key.as_str());
                }
            }
            return Err(e);
        }
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }
    fn name(&self) -> &'static str {
        "json_file"
    }
}
