use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::ClaimHookEngine;
use crate::graph::{
    boost_permissions, is_boost_admin, BoostPermissions, ClaimHook, ClaimHookType, Role,
};
use crate::types::{BrainError, Result};

/// Request to attach a hook to a boost
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClaimHook {
    #[serde(rename = "type")]
    pub hook_type: ClaimHookType,
    /// Boost whose claim fires the hook
    pub claim_boost_id: String,
    /// Boost the hook acts on
    pub target_boost_id: String,
    /// Required for GRANT_PERMISSIONS
    #[serde(default)]
    pub permissions: Option<BoostPermissions>,
}

impl ClaimHookEngine {
    /// Create a hook on behalf of `profile_id`.
    ///
    /// The caller must administer the claim boost. GRANT_PERMISSIONS also
    /// needs permission management on the target and may only hand out
    /// permissions the caller holds there; ADD_ADMIN needs admin on the
    /// target.
    pub async fn create_hook(&self, profile_id: &str, request: NewClaimHook) -> Result<ClaimHook> {
        for boost_id in [&request.claim_boost_id, &request.target_boost_id] {
            if self.graph.get_boost(boost_id).await?.is_none() {
                return Err(BrainError::NotFound(format!("Boost {}", boost_id)));
            }
        }

        if !is_boost_admin(self.graph.as_ref(), profile_id, &request.claim_boost_id).await? {
            return Err(BrainError::Unauthorized(
                "Profile does not have admin rights over claim boost".into(),
            ));
        }

        let role_to_grant = match request.hook_type {
            ClaimHookType::GrantPermissions => {
                let permissions = request.permissions.clone().ok_or_else(|| {
                    BrainError::BadRequest("GRANT_PERMISSIONS hooks require permissions".into())
                })?;

                let held =
                    boost_permissions(self.graph.as_ref(), profile_id, &request.target_boost_id)
                        .await?;
                if !held.can_manage_permissions || !held.covers(&permissions) {
                    return Err(BrainError::Unauthorized(
                        "Profile cannot grant these permissions on target boost".into(),
                    ));
                }

                let role = Role {
                    id: uuid::Uuid::new_v4().to_string(),
                    permissions,
                };
                let role_id = role.id.clone();
                self.graph.create_role(role).await?;
                Some(role_id)
            }
            ClaimHookType::AddAdmin => {
                if !is_boost_admin(self.graph.as_ref(), profile_id, &request.target_boost_id).await? {
                    return Err(BrainError::Unauthorized(
                        "Profile does not have admin rights over target boost".into(),
                    ));
                }
                None
            }
            ClaimHookType::AutoConnect => None,
        };

        let now = Utc::now();
        let hook = ClaimHook {
            id: uuid::Uuid::new_v4().to_string(),
            hook_type: request.hook_type,
            hook_for: request.claim_boost_id,
            target: request.target_boost_id,
            role_to_grant,
            created_at: now,
            updated_at: now,
        };

        self.graph.create_claim_hook(hook.clone()).await?;
        info!(
            hook_id = %hook.id,
            hook_type = %hook.hook_type,
            hook_for = %hook.hook_for,
            target = %hook.target,
            "Created claim hook"
        );

        Ok(hook)
    }

    /// Hooks fired by claims of the boost, oldest first
    pub async fn hooks_for_boost(&self, boost_id: &str) -> Result<Vec<ClaimHook>> {
        self.graph.claim_hooks_for(boost_id, None).await
    }

    /// Delete a hook; only admins of its claim boost may do so
    pub async fn delete_hook(&self, profile_id: &str, hook_id: &str) -> Result<()> {
        let hook = self
            .graph
            .get_claim_hook(hook_id)
            .await?
            .ok_or_else(|| BrainError::NotFound(format!("Claim hook {}", hook_id)))?;

        if !is_boost_admin(self.graph.as_ref(), profile_id, &hook.hook_for).await? {
            return Err(BrainError::Unauthorized(
                "Profile does not have admin rights over claim boost".into(),
            ));
        }

        self.graph.delete_claim_hook(hook_id).await?;
        info!(hook_id = %hook_id, "Deleted claim hook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{DidDocService, MemoryDidCache, MemoryLock};
    use crate::graph::{
        ensure_default_roles, Boost, CredentialRecord, GraphStore, MemoryGraph, ProfileManager,
        RoleGrant, CREATOR_ROLE_ID,
    };
    use crate::identity::{DidResolver, Ed25519Identity};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        graph: Arc<MemoryGraph>,
        did_docs: Arc<DidDocService>,
        engine: ClaimHookEngine,
    }

    async fn fixture() -> Fixture {
        let graph = Arc::new(MemoryGraph::new());
        ensure_default_roles(graph.as_ref()).await.unwrap();

        let did_docs = Arc::new(DidDocService::new(
            graph.clone(),
            Arc::new(Ed25519Identity::from_seed([2u8; 32], Arc::new(DidResolver::new()))),
            Arc::new(MemoryDidCache::default()),
            Arc::new(MemoryLock::default()),
        ));

        for id in ["claim", "target"] {
            graph
                .create_boost(Boost {
                    id: id.into(),
                    owner: "owner".into(),
                    name: id.into(),
                    category: None,
                    template: "{}".into(),
                    claim_role: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
            graph
                .grant_role(RoleGrant {
                    profile_id: "owner".into(),
                    boost_id: id.into(),
                    role_id: CREATOR_ROLE_ID.into(),
                })
                .await
                .unwrap();
        }

        Fixture {
            engine: ClaimHookEngine::new(graph.clone(), did_docs.clone()),
            graph,
            did_docs,
        }
    }

    fn request(hook_type: ClaimHookType) -> NewClaimHook {
        NewClaimHook {
            hook_type,
            claim_boost_id: "claim".into(),
            target_boost_id: "target".into(),
            permissions: Some(BoostPermissions {
                role: "Issuer".into(),
                can_issue: true,
                ..Default::default()
            }),
        }
    }

    fn claimed(boost_id: Option<&str>) -> CredentialRecord {
        CredentialRecord {
            id: "c1".into(),
            payload: json!({ "boostId": "lc:network:example.com/trpc:boost:claim" }),
            boost_id: boost_id.map(String::from),
            issuer: "owner".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_grant_permissions_hook() {
        let f = fixture().await;
        let hook = f
            .engine
            .create_hook("owner", request(ClaimHookType::GrantPermissions))
            .await
            .unwrap();
        assert!(hook.role_to_grant.is_some());

        f.engine.process("claimer", &claimed(Some("claim"))).await.unwrap();

        let permissions = boost_permissions(f.graph.as_ref(), "claimer", "target").await.unwrap();
        assert!(permissions.can_issue);
        assert!(!permissions.can_edit);

        // Processing again is a no-op
        f.engine.process("claimer", &claimed(Some("claim"))).await.unwrap();
        assert_eq!(f.graph.roles_for_profile("claimer", "target").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_admin_and_auto_connect_hooks() {
        let f = fixture().await;
        f.engine.create_hook("owner", request(ClaimHookType::AddAdmin)).await.unwrap();
        f.engine.create_hook("owner", request(ClaimHookType::AutoConnect)).await.unwrap();

        f.engine.process("claimer", &claimed(Some("claim"))).await.unwrap();

        assert!(is_boost_admin(f.graph.as_ref(), "claimer", "target").await.unwrap());
        assert_eq!(
            f.graph.auto_connect_recipients("target").await.unwrap(),
            vec!["claimer".to_string()]
        );
        assert_eq!(f.engine.hooks_for_boost("claim").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_credentials_without_boost_are_ignored() {
        let f = fixture().await;
        f.engine.create_hook("owner", request(ClaimHookType::AddAdmin)).await.unwrap();
        f.engine.process("claimer", &claimed(None)).await.unwrap();
        assert!(!is_boost_admin(f.graph.as_ref(), "claimer", "target").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_admins_cannot_manage_hooks() {
        let f = fixture().await;
        let err = f
            .engine
            .create_hook("stranger", request(ClaimHookType::AutoConnect))
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::Unauthorized(_)));

        let hook = f.engine.create_hook("owner", request(ClaimHookType::AutoConnect)).await.unwrap();
        assert!(matches!(
            f.engine.delete_hook("stranger", &hook.id).await,
            Err(BrainError::Unauthorized(_))
        ));
        f.engine.delete_hook("owner", &hook.id).await.unwrap();
        assert!(matches!(
            f.engine.delete_hook("owner", &hook.id).await,
            Err(BrainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_grant_requires_permissions_and_existing_boosts() {
        let f = fixture().await;

        let mut missing = request(ClaimHookType::GrantPermissions);
        missing.permissions = None;
        assert!(matches!(
            f.engine.create_hook("owner", missing).await,
            Err(BrainError::BadRequest(_))
        ));

        let mut unknown = request(ClaimHookType::AutoConnect);
        unknown.target_boost_id = "nope".into();
        assert!(matches!(
            f.engine.create_hook("owner", unknown).await,
            Err(BrainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_claim_invalidates_child_manager_documents() {
        let f = fixture().await;
        let key = ed25519_dalek::SigningKey::from_bytes(&[4u8; 32]);
        f.graph
            .create_profile_manager(ProfileManager {
                id: "m1".into(),
                did: crate::identity::encode_did_key(key.verifying_key().as_bytes()),
                child_of: Some("claim".into()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        f.did_docs.manager_document("m1", "example.com").await.unwrap();
        assert_eq!(f.did_docs.generation_count(), 1);

        f.engine.process("claimer", &claimed(Some("claim"))).await.unwrap();

        f.did_docs.manager_document("m1", "example.com").await.unwrap();
        assert_eq!(f.did_docs.generation_count(), 2);
    }
}
