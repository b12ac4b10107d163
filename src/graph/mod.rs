//! Graph access layer
//!
//! The protocol engines only see the [`GraphStore`] trait. Two backends:
//!
//! - [`MemoryGraph`]: process-local, used in dev mode and tests
//! - [`MongoGraph`]: MongoDB collections, one per node/edge type, with unique
//!   indexes standing in for graph uniqueness constraints

pub mod memory;
pub mod model;
pub mod mongo;

pub use memory::MemoryGraph;
pub use model::{
    Boost, BoostPermissions, ClaimHook, ClaimHookType, CredentialRecord, Profile,
    ProfileManager, Role, RoleGrant, Transfer, TransferQuery, ADMIN_ROLE_ID, CREATOR_ROLE_ID,
};
pub use mongo::MongoGraph;

use chrono::{DateTime, Utc};

use crate::types::Result;
use crate::uri::ResourceKind;

/// Storage contract the protocol depends on
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    // ---- profiles ----

    /// Create a profile; `Conflict` if the handle, DID or email is taken
    async fn create_profile(&self, profile: Profile) -> Result<()>;

    /// Replace a profile's attributes; `Conflict` on collisions with other profiles
    async fn update_profile(&self, profile: Profile) -> Result<()>;

    /// Look up a live profile by handle (soft-deleted profiles are invisible)
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>>;

    async fn get_profile_by_did(&self, did: &str) -> Result<Option<Profile>>;

    /// Soft-delete a profile; returns false if it did not exist
    async fn delete_profile(&self, profile_id: &str) -> Result<bool>;

    // ---- profile managers ----

    async fn create_profile_manager(&self, manager: ProfileManager) -> Result<()>;

    async fn get_profile_manager(&self, id: &str) -> Result<Option<ProfileManager>>;

    /// Managers that are `childOf` the boost
    async fn child_profile_managers(&self, boost_id: &str) -> Result<Vec<ProfileManager>>;

    // ---- boosts and roles ----

    async fn create_boost(&self, boost: Boost) -> Result<()>;

    async fn get_boost(&self, id: &str) -> Result<Option<Boost>>;

    /// Create a role if no role with that id exists
    async fn create_role(&self, role: Role) -> Result<()>;

    async fn get_role(&self, id: &str) -> Result<Option<Role>>;

    /// Merge a `hasRole` edge (create-if-absent)
    async fn grant_role(&self, grant: RoleGrant) -> Result<()>;

    /// Roles the profile holds on the boost
    async fn roles_for_profile(&self, profile_id: &str, boost_id: &str) -> Result<Vec<Role>>;

    // ---- claim hooks ----

    async fn create_claim_hook(&self, hook: ClaimHook) -> Result<()>;

    async fn get_claim_hook(&self, id: &str) -> Result<Option<ClaimHook>>;

    /// Hooks that are `hookFor` the boost, optionally of one type
    async fn claim_hooks_for(
        &self,
        boost_id: &str,
        hook_type: Option<ClaimHookType>,
    ) -> Result<Vec<ClaimHook>>;

    async fn delete_claim_hook(&self, id: &str) -> Result<bool>;

    /// Merge an `autoConnectRecipient` edge from the boost to the profile
    async fn add_auto_connect_recipient(&self, boost_id: &str, profile_id: &str) -> Result<()>;

    async fn auto_connect_recipients(&self, boost_id: &str) -> Result<Vec<String>>;

    // ---- credentials ----

    async fn create_credential(&self, credential: CredentialRecord) -> Result<()>;

    async fn get_credential(&self, id: &str) -> Result<Option<CredentialRecord>>;

    /// Delete a credential and every transfer of it
    async fn delete_credential(&self, id: &str) -> Result<bool>;

    /// Create the `sentTo` edge; `Conflict` if already sent to that recipient
    async fn create_transfer(&self, transfer: Transfer) -> Result<()>;

    async fn get_transfer(&self, credential_id: &str, to: &str) -> Result<Option<Transfer>>;

    /// Mark a pending transfer received. Returns false when it was not
    /// pending, so two racing accepts cannot both succeed.
    async fn mark_received(&self, credential_id: &str, to: &str, at: DateTime<Utc>)
        -> Result<bool>;

    /// Undo [`GraphStore::mark_received`] after a failed claim
    async fn unmark_received(&self, credential_id: &str, to: &str) -> Result<()>;

    async fn transfers(&self, query: TransferQuery) -> Result<Vec<Transfer>>;

    // ---- other addressable documents ----

    /// Store a presentation, contract or terms document
    async fn store_document(
        &self,
        kind: ResourceKind,
        id: &str,
        document: serde_json::Value,
    ) -> Result<()>;

    async fn get_document(&self, kind: ResourceKind, id: &str)
        -> Result<Option<serde_json::Value>>;
}

/// Seed the singleton roles every deployment relies on
pub async fn ensure_default_roles(graph: &dyn GraphStore) -> Result<()> {
    graph.create_role(Role::admin()).await?;
    graph.create_role(Role::creator()).await?;
    Ok(())
}

/// Merged permissions of every role the profile holds on the boost
pub async fn boost_permissions(
    graph: &dyn GraphStore,
    profile_id: &str,
    boost_id: &str,
) -> Result<BoostPermissions> {
    let roles = graph.roles_for_profile(profile_id, boost_id).await?;

    Ok(roles
        .iter()
        .fold(BoostPermissions::default(), |acc, role| acc.merge(&role.permissions)))
}

/// Whether the profile is an admin (or the creator) of the boost
pub async fn is_boost_admin(graph: &dyn GraphStore, profile_id: &str, boost_id: &str) -> Result<bool> {
    let roles = graph.roles_for_profile(profile_id, boost_id).await?;
    Ok(roles.iter().any(Role::is_admin))
}
