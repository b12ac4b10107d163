//! Storing addressable documents
//!
//! Credentials, presentations, contracts and terms stored here get a
//! network URI that [`crate::uri::UriResolver`] resolves. Boosts have their
//! own creation flow.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::credentials::CredentialPayload;
use crate::graph::{CredentialRecord, GraphStore, Profile};
use crate::types::{BrainError, Result};
use crate::uri::{self, ResourceKind};

pub struct StorageService {
    graph: Arc<dyn GraphStore>,
}

impl StorageService {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Store `item` as a resource of `kind` owned by `owner`; returns its URI
    pub async fn store(
        &self,
        owner: &Profile,
        kind: ResourceKind,
        item: Value,
        domain: &str,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();

        match kind {
            ResourceKind::Credential => {
                let payload = CredentialPayload::from_value(item)?.into_value()?;
                self.graph
                    .create_credential(CredentialRecord {
                        id: id.clone(),
                        payload,
                        boost_id: None,
                        issuer: owner.profile_id.clone(),
                        created_at: Utc::now(),
                    })
                    .await?;
            }
            ResourceKind::Boost => {
                return Err(BrainError::BadRequest(
                    "Boosts are created through /api/boost/create".into(),
                ));
            }
            ResourceKind::Presentation | ResourceKind::Contract | ResourceKind::Terms => {
                if !item.is_object() {
                    return Err(BrainError::BadRequest(format!(
                        "A stored {} must be a JSON object",
                        kind
                    )));
                }
                self.graph.store_document(kind, &id, item).await?;
            }
        }

        let uri = uri::construct(kind, &id, domain);
        info!(uri = %uri, owner = %owner.profile_id, "Stored document");
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::identity::{DidResolver, Ed25519Identity};
    use crate::uri::{Resource, UriResolver};
    use serde_json::json;

    const DOMAIN: &str = "localhost%3A3000";

    fn owner() -> Profile {
        Profile {
            profile_id: "usera".into(),
            did: "did:key:z6Mkowner".into(),
            display_name: String::new(),
            short_bio: String::new(),
            email: None,
            image: None,
            created_at: Utc::now(),
        }
    }

    fn resolver(graph: Arc<MemoryGraph>) -> UriResolver {
        UriResolver::new(
            graph,
            Arc::new(Ed25519Identity::from_seed([1u8; 32], Arc::new(DidResolver::new()))),
            reqwest::Client::new(),
            DOMAIN,
        )
    }

    #[tokio::test]
    async fn test_stored_documents_resolve() {
        let graph = Arc::new(MemoryGraph::new());
        let storage = StorageService::new(graph.clone());
        let resolver = resolver(graph);

        let presentation = json!({ "type": ["VerifiablePresentation"], "holder": "did:key:z6Mkowner" });
        let uri = storage
            .store(&owner(), ResourceKind::Presentation, presentation.clone(), DOMAIN)
            .await
            .unwrap();
        assert_eq!(
            resolver.resolve(&uri).await.unwrap(),
            Resource::Presentation(presentation)
        );

        let terms = json!({ "read": { "credentials": {} } });
        let uri = storage
            .store(&owner(), ResourceKind::Terms, terms.clone(), DOMAIN)
            .await
            .unwrap();
        assert_eq!(resolver.resolve(&uri).await.unwrap(), Resource::Terms(terms));
    }

    #[tokio::test]
    async fn test_store_rejects_bad_items() {
        let storage = StorageService::new(Arc::new(MemoryGraph::new()));

        for (kind, item) in [
            (ResourceKind::Boost, json!({})),
            (ResourceKind::Contract, json!("text")),
            (ResourceKind::Credential, json!({ "name": "not a credential" })),
        ] {
            assert!(matches!(
                storage.store(&owner(), kind, item, DOMAIN).await,
                Err(BrainError::BadRequest(_))
            ));
        }
    }
}
