//! Boost, role and claim hook documents

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::graph::{Boost, ClaimHook, Role};

pub const BOOST_COLLECTION: &str = "boosts";
pub const ROLE_COLLECTION: &str = "roles";
pub const CLAIM_HOOK_COLLECTION: &str = "claim_hooks";

/// Boost node
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BoostDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub boost: Boost,
}

impl BoostDoc {
    pub fn new(boost: Boost) -> Self {
        Self {
            _id: boost.id.clone(),
            metadata: Metadata::new(),
            boost,
        }
    }
}

impl IntoIndexes for BoostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "owner": 1 },
            Some(IndexOptions::builder().name("owner_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for BoostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Role node
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RoleDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub role: Role,
}

impl IntoIndexes for RoleDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

impl MutMetadata for RoleDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Claim hook node with its `hookFor` and `target` edges inlined
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClaimHookDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub hook: ClaimHook,
}

impl ClaimHookDoc {
    pub fn new(hook: ClaimHook) -> Self {
        Self {
            _id: hook.id.clone(),
            metadata: Metadata::new(),
            hook,
        }
    }
}

impl IntoIndexes for ClaimHookDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "hookFor": 1, "type": 1 },
            Some(
                IndexOptions::builder()
                    .name("hook_for_type_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ClaimHookDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
