//! Presentation, contract and terms documents

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::uri::ResourceKind;

pub const RESOURCE_COLLECTION: &str = "resources";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResourceDoc {
    /// `<kind>:<id>`
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub kind: ResourceKind,

    pub body: serde_json::Value,
}

impl ResourceDoc {
    pub fn key(kind: ResourceKind, id: &str) -> String {
        format!("{}:{}", kind, id)
    }
}

impl IntoIndexes for ResourceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

impl MutMetadata for ResourceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
