//! Distributed locks
//!
//! A lock serialises DID document generation for one key. The in-process
//! lock is enough for a single instance; instances sharing a database use
//! the MongoDB lock, whose entries carry an expiry so a crashed holder
//! cannot block a key forever.

use bson::doc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::db::schemas::{LockDoc, Metadata, LOCK_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{BrainError, Result};

/// Interval between attempts to take a contended shared lock
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

#[async_trait::async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquire the lock on `resource`, waiting a bounded time
    async fn acquire(&self, resource: &str) -> Result<LockGuard>;
}

type LocalLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

enum Held {
    Local {
        guard: OwnedMutexGuard<()>,
        locks: LocalLocks,
    },
    Shared {
        lock: MongoLock,
        owner: String,
    },
}

/// Unlock, then forget the resource's mutex if nobody else holds or waits on it
fn release_local(locks: &LocalLocks, resource: &str, guard: OwnedMutexGuard<()>) {
    drop(guard);
    locks.remove_if(resource, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// A held lock. Call [`LockGuard::release`]; dropping the guard releases
/// in the background.
pub struct LockGuard {
    resource: String,
    held: Option<Held>,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.held {
            Some(Held::Local { .. }) => "local",
            Some(Held::Shared { .. }) => "shared",
            None => "released",
        };
        f.debug_struct("LockGuard")
            .field("resource", &self.resource)
            .field("kind", &kind)
            .finish()
    }
}

impl LockGuard {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub async fn release(mut self) -> Result<()> {
        match self.held.take() {
            Some(Held::Shared { lock, owner }) => lock.release(&self.resource, &owner).await,
            Some(Held::Local { guard, locks }) => {
                release_local(&locks, &self.resource, guard);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match self.held.take() {
            Some(Held::Local { guard, locks }) => release_local(&locks, &self.resource, guard),
            Some(Held::Shared { lock, owner }) => {
                let resource = std::mem::take(&mut self.resource);
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            if let Err(e) = lock.release(&resource, &owner).await {
                                warn!(resource = %resource, error = %e, "Failed to release dropped lock");
                            }
                        });
                    }
                    Err(_) => {
                        warn!(resource = %resource, "Lock dropped outside a runtime; it will expire");
                    }
                }
            }
            None => {}
        }
    }
}

// =============================================================================
// In-process lock
// =============================================================================

/// One tokio mutex per resource
pub struct MemoryLock {
    locks: LocalLocks,
    wait: Duration,
}

impl MemoryLock {
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            wait,
        }
    }

    /// Resources with a live mutex (held or waited on)
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Default for MemoryLock {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait::async_trait]
impl DistributedLock for MemoryLock {
    async fn acquire(&self, resource: &str) -> Result<LockGuard> {
        let mutex = self
            .locks
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match tokio::time::timeout(self.wait, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                self.locks
                    .remove_if(resource, |_, mutex| Arc::strong_count(mutex) == 1);
                return Err(BrainError::LockTimeout(format!(
                    "Timed out waiting for {}",
                    resource
                )));
            }
        };

        Ok(LockGuard {
            resource: resource.to_string(),
            held: Some(Held::Local {
                guard,
                locks: self.locks.clone(),
            }),
        })
    }
}

// =============================================================================
// MongoDB lock
// =============================================================================

/// Lock shared through the `locks` collection
#[derive(Clone)]
pub struct MongoLock {
    collection: MongoCollection<LockDoc>,
    ttl: Duration,
    wait: Duration,
}

impl MongoLock {
    pub async fn new(client: &MongoClient, ttl: Duration, wait: Duration) -> Result<Self> {
        Ok(Self {
            collection: client.collection(LOCK_COLLECTION).await?,
            ttl,
            wait,
        })
    }

    fn expiry(&self) -> bson::DateTime {
        bson::DateTime::from_millis(
            bson::DateTime::now().timestamp_millis() + self.ttl.as_millis() as i64,
        )
    }

    /// One attempt: insert a fresh lock, or steal an expired one
    async fn try_acquire(&self, resource: &str, owner: &str) -> Result<bool> {
        let lock = LockDoc {
            _id: resource.to_string(),
            metadata: Metadata::new(),
            owner: owner.to_string(),
            expires_at: self.expiry(),
        };

        match self.collection.insert_one(lock).await {
            Ok(()) => return Ok(true),
            Err(BrainError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }

        let stolen = self
            .collection
            .update_one(
                doc! { "_id": resource, "expires_at": { "$lt": bson::DateTime::now() } },
                doc! { "$set": { "owner": owner, "expires_at": self.expiry() } },
            )
            .await?;

        if stolen.modified_count > 0 {
            debug!(resource = %resource, "Took over expired lock");
            return Ok(true);
        }
        Ok(false)
    }

    async fn release(&self, resource: &str, owner: &str) -> Result<()> {
        self.collection
            .delete_many(doc! { "_id": resource, "owner": owner })
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DistributedLock for MongoLock {
    async fn acquire(&self, resource: &str) -> Result<LockGuard> {
        let owner = uuid::Uuid::new_v4().to_string();
        let deadline = tokio::time::Instant::now() + self.wait;

        loop {
            if self.try_acquire(resource, &owner).await? {
                return Ok(LockGuard {
                    resource: resource.to_string(),
                    held: Some(Held::Shared {
                        lock: self.clone(),
                        owner,
                    }),
                });
            }

            if tokio::time::Instant::now() + RETRY_INTERVAL > deadline {
                return Err(BrainError::LockTimeout(format!(
                    "Timed out waiting for {}",
                    resource
                )));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}
