//! Boosts: credential templates owned by an issuer
//!
//! A boost's template is stored as JSON text and may contain `{{variable}}`
//! placeholders that are filled in per recipient when the boost is sent.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::credentials::CredentialEngine;
use crate::did::DidSubject;
use crate::graph::{
    boost_permissions, is_boost_admin, Boost, BoostPermissions, GraphStore, Profile,
    ProfileManager, Role, RoleGrant, CREATOR_ROLE_ID,
};
use crate::template;
use crate::types::{BrainError, Result};
use crate::uri::{self, ResourceKind};

/// Field stamped on every sent boost instance
const BOOST_ID_FIELD: &str = "boostId";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBoost {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Credential object, or JSON text containing template variables
    pub credential: Value,
    /// Permissions granted to everyone who claims the boost
    #[serde(default)]
    pub claim_permissions: Option<BoostPermissions>,
}

pub struct BoostService {
    graph: Arc<dyn GraphStore>,
    credentials: Arc<CredentialEngine>,
}

impl BoostService {
    pub fn new(graph: Arc<dyn GraphStore>, credentials: Arc<CredentialEngine>) -> Self {
        Self { graph, credentials }
    }

    fn template_text(credential: Value) -> Result<String> {
        let text = match credential {
            Value::String(text) => text,
            other => other.to_string(),
        };

        // Templates without variables are sent as-is, so they must already be JSON
        if !template::has_variables(&text) {
            template::parse::<Value>(&text)?;
        }
        Ok(text)
    }

    /// Create a boost owned by `creator`. Returns its URI.
    pub async fn create_boost(&self, creator: &Profile, new: NewBoost, domain: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let template = Self::template_text(new.credential)?;

        let claim_role = match new.claim_permissions {
            Some(permissions) => {
                let role = Role {
                    id: uuid::Uuid::new_v4().to_string(),
                    permissions,
                };
                let role_id = role.id.clone();
                self.graph.create_role(role).await?;
                Some(role_id)
            }
            None => None,
        };

        self.graph
            .create_boost(Boost {
                id: id.clone(),
                owner: creator.profile_id.clone(),
                name: new.name,
                category: new.category,
                template,
                claim_role,
                created_at: Utc::now(),
            })
            .await?;

        self.graph
            .grant_role(RoleGrant {
                profile_id: creator.profile_id.clone(),
                boost_id: id.clone(),
                role_id: CREATOR_ROLE_ID.to_string(),
            })
            .await?;

        let uri = uri::construct(ResourceKind::Boost, &id, domain);
        info!(uri = %uri, owner = %creator.profile_id, "Created boost");
        Ok(uri)
    }

    pub async fn get_boost(&self, boost_uri: &str, domain: &str) -> Result<Boost> {
        let parsed = uri::parse(boost_uri, domain)?;
        parsed.expect_kind(ResourceKind::Boost)?;

        self.graph
            .get_boost(&parsed.id)
            .await?
            .ok_or_else(|| BrainError::NotFound(format!("Boost {}", parsed.id)))
    }

    /// Merged permissions `profile_id` holds on the boost
    pub async fn permissions(
        &self,
        profile_id: &str,
        boost_uri: &str,
        domain: &str,
    ) -> Result<BoostPermissions> {
        let boost = self.get_boost(boost_uri, domain).await?;
        boost_permissions(self.graph.as_ref(), profile_id, &boost.id).await
    }

    /// Render the boost for one recipient and send it.
    ///
    /// The sender needs issue permission on the boost. The sent credential
    /// carries the boost URI in `boostId`.
    pub async fn send_boost(
        &self,
        from: &Profile,
        to: &str,
        boost_uri: &str,
        template_data: Option<Map<String, Value>>,
        domain: &str,
    ) -> Result<String> {
        let boost = self.get_boost(boost_uri, domain).await?;

        let permissions = boost_permissions(self.graph.as_ref(), &from.profile_id, &boost.id).await?;
        if !permissions.can_issue {
            return Err(BrainError::Unauthorized(
                "Profile does not have permission to issue this boost".into(),
            ));
        }

        let data = template_data.unwrap_or_default();
        let mut credential = template::render_json(&boost.template, &data)?;

        let object = credential.as_object_mut().ok_or_else(|| {
            BrainError::BadRequest("Boost template must describe a JSON object".into())
        })?;
        object.insert(
            BOOST_ID_FIELD.to_string(),
            Value::String(uri::construct(ResourceKind::Boost, &boost.id, domain)),
        );

        self.credentials
            .send(from, to, credential, Some(&boost.id), domain, None)
            .await
    }

    /// Create a profile manager that is a child of the boost. Returns its did:web.
    pub async fn create_child_manager(
        &self,
        profile: &Profile,
        boost_uri: &str,
        did: &str,
        domain: &str,
    ) -> Result<String> {
        let boost = self.get_boost(boost_uri, domain).await?;

        if !is_boost_admin(self.graph.as_ref(), &profile.profile_id, &boost.id).await? {
            return Err(BrainError::Unauthorized(
                "Profile does not have admin rights over this boost".into(),
            ));
        }
        if !did.starts_with("did:key:") {
            return Err(BrainError::BadRequest(
                "Profile managers must be controlled by a did:key".into(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.graph
            .create_profile_manager(ProfileManager {
                id: id.clone(),
                did: did.to_string(),
                child_of: Some(boost.id.clone()),
                created_at: Utc::now(),
            })
            .await?;

        info!(manager_id = %id, boost_id = %boost.id, "Created child profile manager");
        Ok(DidSubject::Manager(id).did_web(domain))
    }
}
