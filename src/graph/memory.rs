//! In-memory graph store
//!
//! Every operation takes the single state lock, so check-then-write
//! sequences (`mark_received`, role merges) are atomic.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::model::{
    Boost, ClaimHook, ClaimHookType, CredentialRecord, Profile, ProfileManager, Role, RoleGrant,
    Transfer, TransferQuery,
};
use super::GraphStore;
use crate::types::{BrainError, Result};
use crate::uri::ResourceKind;

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<String, Profile>,
    deleted_profiles: HashSet<String>,
    managers: HashMap<String, ProfileManager>,
    boosts: HashMap<String, Boost>,
    roles: HashMap<String, Role>,
    grants: HashSet<RoleGrant>,
    hooks: HashMap<String, ClaimHook>,
    auto_connect: HashSet<(String, String)>,
    credentials: HashMap<String, CredentialRecord>,
    transfers: HashMap<(String, String), Transfer>,
    documents: HashMap<(ResourceKind, String), serde_json::Value>,
}

impl MemoryState {
    fn live_profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles
            .values()
            .filter(|p| !self.deleted_profiles.contains(&p.profile_id))
    }

    fn check_profile_conflicts(&self, profile: &Profile, skip: Option<&str>) -> Result<()> {
        for existing in self.live_profiles() {
            if Some(existing.profile_id.as_str()) == skip {
                continue;
            }
            if existing.profile_id == profile.profile_id {
                return Err(BrainError::Conflict(format!(
                    "Profile handle {} is already taken",
                    profile.profile_id
                )));
            }
            if existing.did == profile.did {
                return Err(BrainError::Conflict("DID already has a profile".into()));
            }
            if profile.email.is_some() && existing.email == profile.email {
                return Err(BrainError::Conflict("Email is already in use".into()));
            }
        }
        Ok(())
    }
}

/// Process-local [`GraphStore`]
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<MemoryState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraph {
    async fn create_profile(&self, profile: Profile) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_profile_conflicts(&profile, None)?;
        if state.profiles.contains_key(&profile.profile_id) {
            // A soft-deleted profile keeps its handle reserved for audit trails
            return Err(BrainError::Conflict(format!(
                "Profile handle {} is already taken",
                profile.profile_id
            )));
        }
        state.profiles.insert(profile.profile_id.clone(), profile);
        Ok(())
    }

    async fn update_profile(&self, profile: Profile) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(&profile.profile_id)
            || state.deleted_profiles.contains(&profile.profile_id)
        {
            return Err(BrainError::NotFound(format!("Profile {}", profile.profile_id)));
        }
        state.check_profile_conflicts(&profile, Some(&profile.profile_id))?;
        state.profiles.insert(profile.profile_id.clone(), profile);
        Ok(())
    }

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        let state = self.state.read().await;
        if state.deleted_profiles.contains(profile_id) {
            return Ok(None);
        }
        Ok(state.profiles.get(profile_id).cloned())
    }

    async fn get_profile_by_did(&self, did: &str) -> Result<Option<Profile>> {
        let state = self.state.read().await;
        let found = state.live_profiles().find(|p| p.did == did).cloned();
        Ok(found)
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(profile_id) {
            return Ok(false);
        }
        Ok(state.deleted_profiles.insert(profile_id.to_string()))
    }

    async fn create_profile_manager(&self, manager: ProfileManager) -> Result<()> {
        let mut state = self.state.write().await;
        if state.managers.contains_key(&manager.id) {
            return Err(BrainError::Conflict(format!("Profile manager {}", manager.id)));
        }
        state.managers.insert(manager.id.clone(), manager);
        Ok(())
    }

    async fn get_profile_manager(&self, id: &str) -> Result<Option<ProfileManager>> {
        Ok(self.state.read().await.managers.get(id).cloned())
    }

    async fn child_profile_managers(&self, boost_id: &str) -> Result<Vec<ProfileManager>> {
        let state = self.state.read().await;
        Ok(state
            .managers
            .values()
            .filter(|m| m.child_of.as_deref() == Some(boost_id))
            .cloned()
            .collect())
    }

    async fn create_boost(&self, boost: Boost) -> Result<()> {
        let mut state = self.state.write().await;
        if state.boosts.contains_key(&boost.id) {
            return Err(BrainError::Conflict(format!("Boost {}", boost.id)));
        }
        state.boosts.insert(boost.id.clone(), boost);
        Ok(())
    }

    async fn get_boost(&self, id: &str) -> Result<Option<Boost>> {
        Ok(self.state.read().await.boosts.get(id).cloned())
    }

    async fn create_role(&self, role: Role) -> Result<()> {
        let mut state = self.state.write().await;
        state.roles.entry(role.id.clone()).or_insert(role);
        Ok(())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.state.read().await.roles.get(id).cloned())
    }

    async fn grant_role(&self, grant: RoleGrant) -> Result<()> {
        self.state.write().await.grants.insert(grant);
        Ok(())
    }

    async fn roles_for_profile(&self, profile_id: &str, boost_id: &str) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .iter()
            .filter(|g| g.profile_id == profile_id && g.boost_id == boost_id)
            .filter_map(|g| state.roles.get(&g.role_id).cloned())
            .collect())
    }

    async fn create_claim_hook(&self, hook: ClaimHook) -> Result<()> {
        self.state.write().await.hooks.insert(hook.id.clone(), hook);
        Ok(())
    }

    async fn get_claim_hook(&self, id: &str) -> Result<Option<ClaimHook>> {
        Ok(self.state.read().await.hooks.get(id).cloned())
    }

    async fn claim_hooks_for(
        &self,
        boost_id: &str,
        hook_type: Option<ClaimHookType>,
    ) -> Result<Vec<ClaimHook>> {
        let state = self.state.read().await;
        let mut hooks: Vec<ClaimHook> = state
            .hooks
            .values()
            .filter(|h| h.hook_for == boost_id)
            .filter(|h| hook_type.map_or(true, |t| h.hook_type == t))
            .cloned()
            .collect();
        hooks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(hooks)
    }

    async fn delete_claim_hook(&self, id: &str) -> Result<bool> {
        Ok(self.state.write().await.hooks.remove(id).is_some())
    }

    async fn add_auto_connect_recipient(&self, boost_id: &str, profile_id: &str) -> Result<()> {
        self.state
            .write()
            .await
            .auto_connect
            .insert((boost_id.to_string(), profile_id.to_string()));
        Ok(())
    }

    async fn auto_connect_recipients(&self, boost_id: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut recipients: Vec<String> = state
            .auto_connect
            .iter()
            .filter(|(b, _)| b == boost_id)
            .map(|(_, p)| p.clone())
            .collect();
        recipients.sort();
        Ok(recipients)
    }

    async fn create_credential(&self, credential: CredentialRecord) -> Result<()> {
        self.state
            .write()
            .await
            .credentials
            .insert(credential.id.clone(), credential);
        Ok(())
    }

    async fn get_credential(&self, id: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.state.read().await.credentials.get(id).cloned())
    }

    async fn delete_credential(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.transfers.retain(|(credential_id, _), _| credential_id != id);
        Ok(state.credentials.remove(id).is_some())
    }

    async fn create_transfer(&self, transfer: Transfer) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (transfer.credential_id.clone(), transfer.to.clone());
        if state.transfers.contains_key(&key) {
            return Err(BrainError::Conflict(format!(
                "Credential {} was already sent to {}",
                transfer.credential_id, transfer.to
            )));
        }
        state.transfers.insert(key, transfer);
        Ok(())
    }

    async fn get_transfer(&self, credential_id: &str, to: &str) -> Result<Option<Transfer>> {
        let state = self.state.read().await;
        Ok(state
            .transfers
            .get(&(credential_id.to_string(), to.to_string()))
            .cloned())
    }

    async fn mark_received(
        &self,
        credential_id: &str,
        to: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state
            .transfers
            .get_mut(&(credential_id.to_string(), to.to_string()))
        {
            Some(transfer) if transfer.received_at.is_none() => {
                transfer.received_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unmark_received(&self, credential_id: &str, to: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(transfer) = state
            .transfers
            .get_mut(&(credential_id.to_string(), to.to_string()))
        {
            transfer.received_at = None;
        }
        Ok(())
    }

    async fn transfers(&self, query: TransferQuery) -> Result<Vec<Transfer>> {
        let state = self.state.read().await;
        let mut results: Vec<Transfer> = state
            .transfers
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        results.truncate(query.limit);
        Ok(results)
    }

    async fn store_document(
        &self,
        kind: ResourceKind,
        id: &str,
        document: serde_json::Value,
    ) -> Result<()> {
        self.state
            .write()
            .await
            .documents
            .insert((kind, id.to_string()), document);
        Ok(())
    }

    async fn get_document(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>> {
        let state = self.state.read().await;
        Ok(state.documents.get(&(kind, id.to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(handle: &str, did: &str) -> Profile {
        Profile {
            profile_id: handle.to_string(),
            did: did.to_string(),
            display_name: String::new(),
            short_bio: String::new(),
            email: None,
            image: None,
            created_at: Utc::now(),
        }
    }

    fn transfer(credential_id: &str, to: &str) -> Transfer {
        Transfer {
            credential_id: credential_id.to_string(),
            from: "issuer".to_string(),
            to: to.to_string(),
            sent_at: Utc::now(),
            received_at: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_profile_conflicts() {
        let graph = MemoryGraph::new();
        graph.create_profile(profile("usera", "did:key:a")).await.unwrap();

        let err = graph.create_profile(profile("usera", "did:key:other")).await.unwrap_err();
        assert!(matches!(err, BrainError::Conflict(_)));

        let err = graph.create_profile(profile("userb", "did:key:a")).await.unwrap_err();
        assert!(matches!(err, BrainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_soft_deleted_profile_is_invisible() {
        let graph = MemoryGraph::new();
        graph.create_profile(profile("usera", "did:key:a")).await.unwrap();
        assert!(graph.delete_profile("usera").await.unwrap());

        assert!(graph.get_profile("usera").await.unwrap().is_none());
        assert!(graph.get_profile_by_did("did:key:a").await.unwrap().is_none());
        assert!(!graph.delete_profile("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_received_only_once() {
        let graph = MemoryGraph::new();
        graph.create_transfer(transfer("c1", "userb")).await.unwrap();

        assert!(graph.mark_received("c1", "userb", Utc::now()).await.unwrap());
        assert!(!graph.mark_received("c1", "userb", Utc::now()).await.unwrap());
        assert!(!graph.mark_received("c1", "nobody", Utc::now()).await.unwrap());

        graph.unmark_received("c1", "userb").await.unwrap();
        assert!(graph.mark_received("c1", "userb", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_sent_twice_conflicts() {
        let graph = MemoryGraph::new();
        graph.create_transfer(transfer("c1", "userb")).await.unwrap();
        assert!(matches!(
            graph.create_transfer(transfer("c1", "userb")).await,
            Err(BrainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_role_grants_merge() {
        let graph = MemoryGraph::new();
        graph.create_role(Role::admin()).await.unwrap();

        let grant = RoleGrant {
            profile_id: "usera".into(),
            boost_id: "b1".into(),
            role_id: "admin".into(),
        };
        graph.grant_role(grant.clone()).await.unwrap();
        graph.grant_role(grant).await.unwrap();

        assert_eq!(graph.roles_for_profile("usera", "b1").await.unwrap().len(), 1);
        assert!(graph.roles_for_profile("usera", "b2").await.unwrap().is_empty());
    }
}
