use futures::future::join3;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::did::{manager_key, DidDocService};
use crate::graph::{ClaimHookType, CredentialRecord, GraphStore, RoleGrant, ADMIN_ROLE_ID};
use crate::types::{BrainError, Result};
use crate::uri::{self, ResourceKind};

/// Applies claim hooks when boost instances are accepted
pub struct ClaimHookEngine {
    pub(super) graph: Arc<dyn GraphStore>,
    did_docs: Arc<DidDocService>,
}

impl ClaimHookEngine {
    pub fn new(graph: Arc<dyn GraphStore>, did_docs: Arc<DidDocService>) -> Self {
        Self { graph, did_docs }
    }

    /// Run every hook of the credential's boost for the claiming profile.
    ///
    /// The three hook types run concurrently and each runs to completion.
    /// Every write is create-if-absent, so processing again after a partial
    /// failure is safe.
    pub async fn process(&self, profile_id: &str, credential: &CredentialRecord) -> Result<()> {
        let Some(boost_id) = credential.boost_id.as_deref() else {
            return Ok(());
        };

        let (grant, admin, connect) = join3(
            self.grant_permissions(profile_id, boost_id),
            self.add_admin(profile_id, boost_id),
            self.auto_connect(profile_id, boost_id),
        )
        .await;

        let mut failed = Vec::new();
        for (hook_type, result) in [
            (ClaimHookType::GrantPermissions, grant),
            (ClaimHookType::AddAdmin, admin),
            (ClaimHookType::AutoConnect, connect),
        ] {
            if let Err(e) = result {
                error!(
                    hook_type = %hook_type,
                    boost_id = %boost_id,
                    profile_id = %profile_id,
                    error = %e,
                    "Claim hook failed"
                );
                failed.push(hook_type.as_str());
            }
        }

        self.invalidate_child_managers(&credential.payload).await;

        if failed.is_empty() {
            Ok(())
        } else {
            Err(BrainError::Internal(format!(
                "Claim hooks failed: {}",
                failed.join(", ")
            )))
        }
    }

    async fn grant_permissions(&self, profile_id: &str, boost_id: &str) -> Result<()> {
        let hooks = self
            .graph
            .claim_hooks_for(boost_id, Some(ClaimHookType::GrantPermissions))
            .await?;

        for hook in hooks {
            let Some(role_id) = hook.role_to_grant else {
                warn!(hook_id = %hook.id, "GRANT_PERMISSIONS hook has no role, skipping");
                continue;
            };

            self.graph
                .grant_role(RoleGrant {
                    profile_id: profile_id.to_string(),
                    boost_id: hook.target.clone(),
                    role_id,
                })
                .await?;
            debug!(hook_id = %hook.id, target = %hook.target, "Granted permissions");
        }
        Ok(())
    }

    async fn add_admin(&self, profile_id: &str, boost_id: &str) -> Result<()> {
        let hooks = self
            .graph
            .claim_hooks_for(boost_id, Some(ClaimHookType::AddAdmin))
            .await?;

        for hook in hooks {
            self.graph
                .grant_role(RoleGrant {
                    profile_id: profile_id.to_string(),
                    boost_id: hook.target.clone(),
                    role_id: ADMIN_ROLE_ID.to_string(),
                })
                .await?;
            debug!(hook_id = %hook.id, target = %hook.target, "Added admin");
        }
        Ok(())
    }

    async fn auto_connect(&self, profile_id: &str, boost_id: &str) -> Result<()> {
        let hooks = self
            .graph
            .claim_hooks_for(boost_id, Some(ClaimHookType::AutoConnect))
            .await?;

        for hook in hooks {
            self.graph
                .add_auto_connect_recipient(&hook.target, profile_id)
                .await?;
            debug!(hook_id = %hook.id, target = %hook.target, "Added auto-connect recipient");
        }
        Ok(())
    }

    /// Drop cached DID documents of the managers that are children of the
    /// credential's boost. Failures are logged only.
    async fn invalidate_child_managers(&self, payload: &Value) {
        let Some(boost_uri) = payload.get("boostId").and_then(Value::as_str) else {
            return;
        };

        let boost_id = match uri::parse_with(boost_uri, "", true)
            .and_then(|parsed| parsed.expect_kind(ResourceKind::Boost).map(|p| p.id.clone()))
        {
            Ok(id) => id,
            Err(e) => {
                warn!(boost_uri = %boost_uri, error = %e, "Credential has an unusable boostId");
                return;
            }
        };

        let managers = match self.graph.child_profile_managers(&boost_id).await {
            Ok(managers) => managers,
            Err(e) => {
                warn!(boost_id = %boost_id, error = %e, "Failed to list child profile managers");
                return;
            }
        };

        for manager in managers {
            if let Err(e) = self.did_docs.invalidate(&manager_key(&manager.id)).await {
                warn!(manager_id = %manager.id, error = %e, "Failed to invalidate DID document");
            }
        }
    }
}
