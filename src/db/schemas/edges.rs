//! Edge documents with create-if-absent semantics
//!
//! The `_id` is derived from the edge endpoints, so an upsert with
//! `$setOnInsert` is a graph MERGE.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::graph::RoleGrant;

pub const ROLE_GRANT_COLLECTION: &str = "role_grants";
pub const AUTO_CONNECT_COLLECTION: &str = "auto_connect_recipients";

/// `hasRole` edge
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RoleGrantDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub grant: RoleGrant,
}

impl RoleGrantDoc {
    pub fn key(grant: &RoleGrant) -> String {
        format!("{}|{}|{}", grant.profile_id, grant.boost_id, grant.role_id)
    }
}

impl IntoIndexes for RoleGrantDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "profileId": 1, "boostId": 1 },
            Some(
                IndexOptions::builder()
                    .name("profile_boost_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for RoleGrantDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// `autoConnectRecipient` edge from a boost to a profile
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AutoConnectDoc {
    #[serde(rename = "_id")]
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub boost_id: String,

    pub profile_id: String,
}

impl AutoConnectDoc {
    pub fn key(boost_id: &str, profile_id: &str) -> String {
        format!("{}|{}", boost_id, profile_id)
    }
}

impl IntoIndexes for AutoConnectDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "boostId": 1 },
            Some(IndexOptions::builder().name("boost_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for AutoConnectDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
