//! DID document cache
//!
//! Generated documents are cached by key: `::root::` for the server,
//! the profile id for profiles, `manager:<id>` for profile managers.

use bson::doc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::db::schemas::{DidDocumentDoc, Metadata, DID_DOCUMENT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{BrainError, Result};

/// Cache key of the server's own document
pub const ROOT_KEY: &str = "::root::";

/// Cache key of a profile manager's document
pub fn manager_key(id: &str) -> String {
    format!("manager:{}", id)
}

/// Storage for generated DID documents, shared by every request worker
#[async_trait::async_trait]
pub trait DidDocCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, document: &Value) -> Result<()>;

    async fn invalidate(&self, key: &str) -> Result<()>;
}

// =============================================================================
// In-memory cache
// =============================================================================

#[derive(Debug, Clone)]
pub struct DidCacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for DidCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 10_000,
        }
    }
}

struct CachedDocument {
    document: Value,
    expires_at: Instant,
    inserted_at: Instant,
}

/// Hit/miss counters
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

/// Process-local cache
pub struct MemoryDidCache {
    cache: DashMap<String, CachedDocument>,
    config: DidCacheConfig,
    stats: CacheStats,
}

impl MemoryDidCache {
    pub fn new(config: DidCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.hits.load(Ordering::Relaxed),
            self.stats.misses.load(Ordering::Relaxed),
        )
    }

    fn evict_oldest(&self) {
        self.cache.retain(|_, v| v.expires_at > Instant::now());

        if self.cache.len() < self.config.max_entries {
            return;
        }

        let oldest_key = self
            .cache
            .iter()
            .min_by_key(|e| e.inserted_at)
            .map(|e| e.key().clone());

        if let Some(key) = oldest_key {
            self.cache.remove(&key);
        }
    }
}

impl Default for MemoryDidCache {
    fn default() -> Self {
        Self::new(DidCacheConfig::default())
    }
}

#[async_trait::async_trait]
impl DidDocCache for MemoryDidCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.cache.get(key) {
            if entry.expires_at > Instant::now() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.document.clone()));
            }
            drop(entry);
            self.cache.remove(key);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, document: &Value) -> Result<()> {
        if self.cache.len() >= self.config.max_entries && !self.cache.contains_key(key) {
            self.evict_oldest();
        }

        let now = Instant::now();
        self.cache.insert(
            key.to_string(),
            CachedDocument {
                document: document.clone(),
                expires_at: now + self.config.ttl,
                inserted_at: now,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.cache.remove(key);
        Ok(())
    }
}

// =============================================================================
// MongoDB cache
// =============================================================================

/// Cache shared across instances through the `did_documents` collection
pub struct MongoDidCache {
    collection: MongoCollection<DidDocumentDoc>,
    ttl: Duration,
}

impl MongoDidCache {
    pub async fn new(client: &MongoClient, ttl: Duration) -> Result<Self> {
        Ok(Self {
            collection: client.collection(DID_DOCUMENT_COLLECTION).await?,
            ttl,
        })
    }
}

#[async_trait::async_trait]
impl DidDocCache for MongoDidCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        // The TTL monitor only sweeps once a minute, so check expiry here too
        let found = self
            .collection
            .find_one(doc! { "_id": key, "expires_at": { "$gt": bson::DateTime::now() } })
            .await?;

        match found {
            Some(cached) => match serde_json::from_str(&cached.document) {
                Ok(document) => Ok(Some(document)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding unreadable cached DID document");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, document: &Value) -> Result<()> {
        let expires_at = bson::DateTime::from_millis(
            bson::DateTime::now().timestamp_millis() + self.ttl.as_millis() as i64,
        );
        let cached = DidDocumentDoc {
            _id: key.to_string(),
            metadata: Metadata::new(),
            document: document.to_string(),
            expires_at,
        };
        let mut encoded = bson::to_document(&cached)
            .map_err(|e| BrainError::Internal(format!("Failed to encode DID document: {}", e)))?;
        encoded.remove("_id");

        self.collection
            .upsert_one(doc! { "_id": key }, doc! { "$set": encoded })
            .await
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.collection.delete_many(doc! { "_id": key }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = MemoryDidCache::default();
        assert!(cache.get(ROOT_KEY).await.unwrap().is_none());

        cache.set(ROOT_KEY, &json!({ "id": "did:web:x" })).await.unwrap();
        assert_eq!(cache.get(ROOT_KEY).await.unwrap().unwrap()["id"], "did:web:x");

        cache.invalidate(ROOT_KEY).await.unwrap();
        assert!(cache.get(ROOT_KEY).await.unwrap().is_none());
        assert_eq!(cache.stats(), (1, 2));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryDidCache::new(DidCacheConfig {
            ttl: Duration::from_millis(10),
            max_entries: 10,
        });
        cache.set("usera", &json!({})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("usera").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = MemoryDidCache::new(DidCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        cache.set("a", &json!(1)).await.unwrap();
        cache.set("b", &json!(2)).await.unwrap();
        cache.set("c", &json!(3)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[test]
    fn test_manager_key() {
        assert_eq!(manager_key("m1"), "manager:m1");
    }
}
