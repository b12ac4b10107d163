//! Cached, lock-protected DID document resolution

use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::DidDocCache;
use super::document::{self, DidSubject};
use super::lock::DistributedLock;
use crate::graph::GraphStore;
use crate::identity::DidCapability;
use crate::types::{BrainError, Result};

/// Serves did:web documents for the server, profiles and profile managers.
///
/// A document is generated at most once per cache lifetime: the first
/// request on a miss takes the key's lock, re-checks the cache and
/// generates; concurrent requests wait on the lock and then hit the cache.
pub struct DidDocService {
    graph: Arc<dyn GraphStore>,
    identity: Arc<dyn DidCapability>,
    cache: Arc<dyn DidDocCache>,
    lock: Arc<dyn DistributedLock>,
    generations: AtomicU64,
}

impl DidDocService {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        identity: Arc<dyn DidCapability>,
        cache: Arc<dyn DidDocCache>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self {
            graph,
            identity,
            cache,
            lock,
            generations: AtomicU64::new(0),
        }
    }

    /// Number of documents generated by this instance
    pub fn generation_count(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    /// The server's own document
    pub async fn root_document(&self, domain: &str) -> Result<Value> {
        let subject = DidSubject::Root;
        self.resolve(&subject, || async {
            let did = self.identity.did();
            document::generate(self.identity.as_ref(), &subject, &did, domain).await
        })
        .await
    }

    /// A profile's document; `NotFound` if the profile does not exist
    pub async fn profile_document(&self, profile_id: &str, domain: &str) -> Result<Value> {
        let subject = DidSubject::Profile(profile_id.to_string());
        self.resolve(&subject, || async {
            let profile = self
                .graph
                .get_profile(profile_id)
                .await?
                .ok_or_else(|| BrainError::NotFound(format!("Profile {}", profile_id)))?;

            document::generate(self.identity.as_ref(), &subject, &profile.did, domain).await
        })
        .await
    }

    /// A profile manager's document; `NotFound` if the manager does not exist
    pub async fn manager_document(&self, id: &str, domain: &str) -> Result<Value> {
        let subject = DidSubject::Manager(id.to_string());
        self.resolve(&subject, || async {
            let manager = self
                .graph
                .get_profile_manager(id)
                .await?
                .ok_or_else(|| BrainError::NotFound(format!("Profile manager {}", id)))?;

            document::generate(self.identity.as_ref(), &subject, &manager.did, domain).await
        })
        .await
    }

    /// Drop a cached document so the next request regenerates it
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        debug!(key = %key, "Invalidating cached DID document");
        self.cache.invalidate(key).await
    }

    async fn resolve<F, Fut>(&self, subject: &DidSubject, generate: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let key = subject.cache_key();

        if let Some(document) = self.cache.get(&key).await? {
            return Ok(document);
        }

        let guard = self.lock.acquire(&format!("did:{}", key)).await?;

        // Another worker may have generated it while we waited
        let cached = match self.cache.get(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                guard.release().await?;
                return Err(e);
            }
        };
        if let Some(document) = cached {
            guard.release().await?;
            return Ok(document);
        }

        let generated = generate().await;
        let document = match generated {
            Ok(document) => document,
            Err(e) => {
                if let Err(release_err) = guard.release().await {
                    warn!(key = %key, error = %release_err, "Failed to release DID lock");
                }
                return Err(e);
            }
        };

        self.generations.fetch_add(1, Ordering::Relaxed);
        let stored = self.cache.set(&key, &document).await;
        guard.release().await?;
        stored?;

        info!(key = %key, "Generated DID document");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::cache::MemoryDidCache;
    use crate::did::lock::MemoryLock;
    use crate::graph::{MemoryGraph, Profile, ProfileManager};
    use crate::identity::{encode_did_key, DidResolver, Ed25519Identity};
    use chrono::Utc;

    const DOMAIN: &str = "localhost:3000";

    fn service(graph: Arc<MemoryGraph>) -> DidDocService {
        DidDocService::new(
            graph,
            Arc::new(Ed25519Identity::from_seed([9u8; 32], Arc::new(DidResolver::new()))),
            Arc::new(MemoryDidCache::default()),
            Arc::new(MemoryLock::default()),
        )
    }

    fn user_did() -> String {
        let key = ed25519_dalek::SigningKey::from_bytes(&[5u8; 32]);
        encode_did_key(key.verifying_key().as_bytes())
    }

    #[tokio::test]
    async fn test_concurrent_first_resolutions_generate_once() {
        let service = Arc::new(service(Arc::new(MemoryGraph::new())));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.root_document(DOMAIN).await })
            })
            .collect();

        let mut documents = Vec::new();
        for handle in handles {
            documents.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(service.generation_count(), 1);
        assert!(documents.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(documents[0]["id"], "did:web:localhost%3A3000");
    }

    #[tokio::test]
    async fn test_profile_document() {
        let graph = Arc::new(MemoryGraph::new());
        graph
            .create_profile(Profile {
                profile_id: "usera".into(),
                did: user_did(),
                display_name: String::new(),
                short_bio: String::new(),
                email: None,
                image: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let service = service(graph);
        let document = service.profile_document("usera", DOMAIN).await.unwrap();

        assert_eq!(document["id"], "did:web:localhost%3A3000:users:usera");
        assert_eq!(document["controller"], user_did());
        assert_eq!(
            document["verificationMethod"][0]["id"],
            "did:web:localhost%3A3000:users:usera#owner"
        );
    }

    #[tokio::test]
    async fn test_missing_subjects_are_not_cached() {
        let graph = Arc::new(MemoryGraph::new());
        let service = service(graph.clone());

        assert!(matches!(
            service.profile_document("ghost", DOMAIN).await,
            Err(BrainError::NotFound(_))
        ));
        assert!(matches!(
            service.manager_document("m1", DOMAIN).await,
            Err(BrainError::NotFound(_))
        ));
        assert_eq!(service.generation_count(), 0);

        // Lock was released on failure, so a later resolution succeeds
        graph
            .create_profile_manager(ProfileManager {
                id: "m1".into(),
                did: user_did(),
                child_of: Some("b1".into()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let document = service.manager_document("m1", DOMAIN).await.unwrap();
        assert_eq!(document["id"], "did:web:localhost%3A3000:manager:m1");
    }

    #[tokio::test]
    async fn test_invalidate_forces_regeneration() {
        let service = service(Arc::new(MemoryGraph::new()));
        service.root_document(DOMAIN).await.unwrap();
        service.root_document(DOMAIN).await.unwrap();
        assert_eq!(service.generation_count(), 1);

        service.invalidate(crate::did::cache::ROOT_KEY).await.unwrap();
        service.root_document(DOMAIN).await.unwrap();
        assert_eq!(service.generation_count(), 2);
    }
}
