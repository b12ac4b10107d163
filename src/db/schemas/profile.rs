//! Profile and profile manager documents

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::graph::{Profile, ProfileManager};

pub const PROFILE_COLLECTION: &str = "profiles";
pub const PROFILE_MANAGER_COLLECTION: &str = "profile_managers";

/// Profile node. `_id` is the handle, so a soft-deleted handle stays taken.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProfileDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub profile: Profile,
}

impl ProfileDoc {
    pub fn new(profile: Profile) -> Self {
        Self {
            _id: profile.profile_id.clone(),
            metadata: Metadata::new(),
            profile,
        }
    }
}

impl IntoIndexes for ProfileDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One live profile per DID
            (
                doc! { "did": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "metadata.is_deleted": false })
                        .name("did_unique".to_string())
                        .build(),
                ),
            ),
            // Emails are optional but unique among live profiles
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! {
                            "email": { "$exists": true },
                            "metadata.is_deleted": false,
                        })
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ProfileDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Profile manager node
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProfileManagerDoc {
    pub _id: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub manager: ProfileManager,
}

impl ProfileManagerDoc {
    pub fn new(manager: ProfileManager) -> Self {
        Self {
            _id: manager.id.clone(),
            metadata: Metadata::new(),
            manager,
        }
    }
}

impl IntoIndexes for ProfileManagerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "childOf": 1 },
            Some(
                IndexOptions::builder()
                    .name("child_of_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ProfileManagerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
