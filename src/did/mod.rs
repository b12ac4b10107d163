//! did:web documents for the server, profiles and profile managers
//!
//! Documents are derived from did:key documents ([`document`]), cached
//! ([`cache`]) and generated under a per-key lock ([`lock`]) so that
//! concurrent first requests produce exactly one generation.

pub mod cache;
pub mod document;
pub mod lock;
pub mod service;

pub use cache::{manager_key, DidCacheConfig, DidDocCache, MemoryDidCache, MongoDidCache, ROOT_KEY};
pub use document::DidSubject;
pub use lock::{DistributedLock, LockGuard, MemoryLock, MongoLock};
pub use service::DidDocService;
