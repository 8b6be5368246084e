//! In-process TTL cache
//!
//! Provides:
//! - Generic get/set operations with TTL
//! - Explicit clear for test isolation
//! - A background sweep task that evicts expired entries
//!
//! The cache is injected through AppState (one instance per process or per
//! test run), never reached through process-wide static state.

use crate::config::CacheSettings;
use crate::errors::{AppError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct Entry {
    json: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-memory TTL cache
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    config: CacheSettings,
}

impl MemoryCache {
    /// Create a new cache
    pub fn new(config: CacheSettings) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Spawn the background sweep task evicting expired entries.
    /// The task ends when the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let Some(cache) = cache.upgrade() else {
                    break;
                };

                let now = Instant::now();
                let mut entries = cache.entries.write().await;
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired(now));

                let evicted = before - entries.len();
                if evicted > 0 {
                    debug!(evicted, remaining = entries.len(), "Cache sweep");
                }
            }
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let entries = self.entries.read().await;

        match entries.get(&full_key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                let parsed = serde_json::from_str(&entry.json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(parsed))
            }
            _ => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Set a value in cache with default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.config.default_ttl_secs).await
    }

    /// Set a value in cache with custom TTL
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<()> {
        let full_key = self.key(key);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let entry = Entry {
            json,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };

        self.entries.write().await.insert(full_key.clone(), entry);

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let removed = self.entries.write().await.remove(&full_key).is_some();

        debug!(key = %full_key, removed, "Cache delete");
        Ok(removed)
    }

    /// Drop every entry. Intended for test isolation between runs.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of live (unexpired) entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// True when no live entry exists
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get or set with a loader function
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl_secs: u64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        // Try to get from cache first
        if let Some(cached) = self.get::<T>(key).await? {
            return Ok(cached);
        }

        // Load from source
        let value = loader().await?;

        // Cache the result
        if let Err(e) = self.set_with_ttl(key, &value, ttl_secs).await {
            warn!(error = %e, "Failed to cache value, continuing without cache");
        }

        Ok(value)
    }
}

/// Cache key builder helpers
pub mod keys {
    use uuid::Uuid;

    /// Build an extraction result cache key
    pub fn extraction(url: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("extraction:{}", hex::encode(hasher.finalize()))
    }

    /// Build a session graph cache key
    pub fn session_graph(session_id: Uuid) -> String {
        format!("session-graph:{}", session_id)
    }

    /// Build a paper cache key
    pub fn paper(paper_id: Uuid) -> String {
        format!("paper:{}", paper_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheSettings {
        CacheSettings {
            default_ttl_secs: 60,
            sweep_interval_secs: 1,
            key_prefix: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = MemoryCache::new(test_config());
        cache.set("k", &vec![1, 2, 3]).await.unwrap();

        let got: Option<Vec<i32>> = cache.get("k").await.unwrap();
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new(test_config());
        cache.set_with_ttl("k", &"v".to_string(), 0).await.unwrap();

        let got: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = MemoryCache::new(test_config());
        cache.set("a", &1).await.unwrap();
        cache.set("b", &2).await.unwrap();

        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_or_load_populates_cache() {
        let cache = MemoryCache::new(test_config());

        let loaded = cache
            .get_or_load("k", 60, || async { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(loaded, "fresh");

        // Second call must hit the cache, not the loader
        let cached: String = cache
            .get_or_load("k", 60, || async {
                Err(AppError::Internal {
                    message: "loader must not run".into(),
                })
            })
            .await
            .unwrap();
        assert_eq!(cached, "fresh");
    }

    #[tokio::test]
    async fn test_sweeper_evicts_expired() {
        let cache = MemoryCache::new(test_config());
        cache.set_with_ttl("k", &1, 0).await.unwrap();

        let handle = cache.spawn_sweeper();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(cache.entries.read().await.len(), 0);
        handle.abort();
    }

    #[test]
    fn test_key_builders() {
        let session_id = uuid::Uuid::new_v4();

        assert!(keys::extraction("https://arxiv.org/abs/1706.03762").starts_with("extraction:"));
        assert!(keys::session_graph(session_id).contains("session-graph:"));
    }
}
