//! Shared DID document cache and lock documents

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const DID_DOCUMENT_COLLECTION: &str = "did_documents";
pub const LOCK_COLLECTION: &str = "locks";

/// Cached DID document, removed by the TTL monitor after `expires_at`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DidDocumentDoc {
    /// Cache key (`::root::`, a profile id, or `manager:<id>`)
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Serialized document
    pub document: String,

    pub expires_at: DateTime,
}

impl IntoIndexes for DidDocumentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "expires_at": 1 },
            Some(
                IndexOptions::builder()
                    .expire_after(Duration::ZERO)
                    .name("expires_at_ttl".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DidDocumentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// A held lock; `_id` is the locked resource
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LockDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Token of the holder; only the holder may release
    pub owner: String,

    /// After this instant the lock may be stolen
    pub expires_at: DateTime,
}

impl IntoIndexes for LockDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "expires_at": 1 },
            Some(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(60))
                    .name("expires_at_ttl".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for LockDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
