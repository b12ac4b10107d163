//! MongoDB-backed graph store

use bson::doc;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::model::{
    Boost, ClaimHook, ClaimHookType, CredentialRecord, Profile, ProfileManager, Role, RoleGrant,
    Transfer, TransferQuery,
};
use super::GraphStore;
use crate::db::schemas::{
    AutoConnectDoc, BoostDoc, ClaimHookDoc, CredentialDoc, Metadata, ProfileDoc,
    ProfileManagerDoc, ResourceDoc, RoleDoc, RoleGrantDoc, TransferDoc, AUTO_CONNECT_COLLECTION,
    BOOST_COLLECTION, CLAIM_HOOK_COLLECTION, CREDENTIAL_COLLECTION, PROFILE_COLLECTION,
    PROFILE_MANAGER_COLLECTION, RESOURCE_COLLECTION, ROLE_COLLECTION, ROLE_GRANT_COLLECTION,
    TRANSFER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{BrainError, Result};
use crate::uri::ResourceKind;

/// [`GraphStore`] over one MongoDB collection per node and edge type
#[derive(Clone)]
pub struct MongoGraph {
    profiles: MongoCollection<ProfileDoc>,
    managers: MongoCollection<ProfileManagerDoc>,
    boosts: MongoCollection<BoostDoc>,
    roles: MongoCollection<RoleDoc>,
    grants: MongoCollection<RoleGrantDoc>,
    hooks: MongoCollection<ClaimHookDoc>,
    auto_connect: MongoCollection<AutoConnectDoc>,
    credentials: MongoCollection<CredentialDoc>,
    transfers: MongoCollection<TransferDoc>,
    resources: MongoCollection<ResourceDoc>,
}

impl MongoGraph {
    /// Open every collection and apply its indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            profiles: client.collection(PROFILE_COLLECTION).await?,
            managers: client.collection(PROFILE_MANAGER_COLLECTION).await?,
            boosts: client.collection(BOOST_COLLECTION).await?,
            roles: client.collection(ROLE_COLLECTION).await?,
            grants: client.collection(ROLE_GRANT_COLLECTION).await?,
            hooks: client.collection(CLAIM_HOOK_COLLECTION).await?,
            auto_connect: client.collection(AUTO_CONNECT_COLLECTION).await?,
            credentials: client.collection(CREDENTIAL_COLLECTION).await?,
            transfers: client.collection(TRANSFER_COLLECTION).await?,
            resources: client.collection(RESOURCE_COLLECTION).await?,
        })
    }
}

/// Re-label the generic duplicate-key conflict for profiles
fn profile_conflict(err: BrainError, profile_id: &str) -> BrainError {
    match err {
        BrainError::Conflict(_) => BrainError::Conflict(format!(
            "Profile {} collides with an existing handle, DID or email",
            profile_id
        )),
        other => other,
    }
}

#[async_trait::async_trait]
impl GraphStore for MongoGraph {
    async fn create_profile(&self, profile: Profile) -> Result<()> {
        let profile_id = profile.profile_id.clone();
        self.profiles
            .insert_one(ProfileDoc::new(profile))
            .await
            .map_err(|e| profile_conflict(e, &profile_id))
    }

    async fn update_profile(&self, profile: Profile) -> Result<()> {
        let profile_id = profile.profile_id.clone();
        let matched = self
            .profiles
            .replace_one(doc! { "_id": &profile_id }, ProfileDoc::new(profile))
            .await
            .map_err(|e| profile_conflict(e, &profile_id))?;

        if !matched {
            return Err(BrainError::NotFound(format!("Profile {}", profile_id)));
        }
        Ok(())
    }

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        let found = self.profiles.find_one(doc! { "_id": profile_id }).await?;
        Ok(found.map(|d| d.profile))
    }

    async fn get_profile_by_did(&self, did: &str) -> Result<Option<Profile>> {
        let found = self.profiles.find_one(doc! { "did": did }).await?;
        Ok(found.map(|d| d.profile))
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<bool> {
        let result = self.profiles.soft_delete(doc! { "_id": profile_id }).await?;
        Ok(result.modified_count > 0)
    }

    async fn create_profile_manager(&self, manager: ProfileManager) -> Result<()> {
        self.managers.insert_one(ProfileManagerDoc::new(manager)).await
    }

    async fn get_profile_manager(&self, id: &str) -> Result<Option<ProfileManager>> {
        let found = self.managers.find_one(doc! { "_id": id }).await?;
        Ok(found.map(|d| d.manager))
    }

    async fn child_profile_managers(&self, boost_id: &str) -> Result<Vec<ProfileManager>> {
        let found = self.managers.find_many(doc! { "childOf": boost_id }).await?;
        Ok(found.into_iter().map(|d| d.manager).collect())
    }

    async fn create_boost(&self, boost: Boost) -> Result<()> {
        self.boosts.insert_one(BoostDoc::new(boost)).await
    }

    async fn get_boost(&self, id: &str) -> Result<Option<Boost>> {
        let found = self.boosts.find_one(doc! { "_id": id }).await?;
        Ok(found.map(|d| d.boost))
    }

    async fn create_role(&self, role: Role) -> Result<()> {
        let permissions = bson::to_bson(&role.permissions)
            .map_err(|e| BrainError::Internal(format!("Failed to encode role: {}", e)))?;

        self.roles
            .upsert_one(
                doc! { "_id": &role.id },
                doc! {
                    "$setOnInsert": {
                        "id": &role.id,
                        "permissions": permissions,
                        "metadata": { "is_deleted": false, "created_at": bson::DateTime::now() },
                    }
                },
            )
            .await
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let found = self.roles.find_one(doc! { "_id": id }).await?;
        Ok(found.map(|d| d.role))
    }

    async fn grant_role(&self, grant: RoleGrant) -> Result<()> {
        self.grants
            .upsert_one(
                doc! { "_id": RoleGrantDoc::key(&grant) },
                doc! {
                    "$setOnInsert": {
                        "profileId": &grant.profile_id,
                        "boostId": &grant.boost_id,
                        "roleId": &grant.role_id,
                        "metadata": { "is_deleted": false, "created_at": bson::DateTime::now() },
                    }
                },
            )
            .await
    }

    async fn roles_for_profile(&self, profile_id: &str, boost_id: &str) -> Result<Vec<Role>> {
        let grants = self
            .grants
            .find_many(doc! { "profileId": profile_id, "boostId": boost_id })
            .await?;

        if grants.is_empty() {
            return Ok(Vec::new());
        }

        let role_ids: Vec<String> = grants.into_iter().map(|g| g.grant.role_id).collect();
        let roles = self
            .roles
            .find_many(doc! { "_id": { "$in": role_ids } })
            .await?;

        Ok(roles.into_iter().map(|d| d.role).collect())
    }

    async fn create_claim_hook(&self, hook: ClaimHook) -> Result<()> {
        self.hooks.insert_one(ClaimHookDoc::new(hook)).await
    }

    async fn get_claim_hook(&self, id: &str) -> Result<Option<ClaimHook>> {
        let found = self.hooks.find_one(doc! { "_id": id }).await?;
        Ok(found.map(|d| d.hook))
    }

    async fn claim_hooks_for(
        &self,
        boost_id: &str,
        hook_type: Option<ClaimHookType>,
    ) -> Result<Vec<ClaimHook>> {
        let mut filter = doc! { "hookFor": boost_id };
        if let Some(hook_type) = hook_type {
            filter.insert("type", hook_type.as_str());
        }

        let mut hooks: Vec<ClaimHook> = self
            .hooks
            .find_many(filter)
            .await?
            .into_iter()
            .map(|d| d.hook)
            .collect();
        hooks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(hooks)
    }

    async fn delete_claim_hook(&self, id: &str) -> Result<bool> {
        Ok(self.hooks.delete_many(doc! { "_id": id }).await? > 0)
    }

    async fn add_auto_connect_recipient(&self, boost_id: &str, profile_id: &str) -> Result<()> {
        self.auto_connect
            .upsert_one(
                doc! { "_id": AutoConnectDoc::key(boost_id, profile_id) },
                doc! {
                    "$setOnInsert": {
                        "boostId": boost_id,
                        "profileId": profile_id,
                        "metadata": { "is_deleted": false, "created_at": bson::DateTime::now() },
                    }
                },
            )
            .await
    }

    async fn auto_connect_recipients(&self, boost_id: &str) -> Result<Vec<String>> {
        let mut recipients: Vec<String> = self
            .auto_connect
            .find_many(doc! { "boostId": boost_id })
            .await?
            .into_iter()
            .map(|d| d.profile_id)
            .collect();
        recipients.sort();
        Ok(recipients)
    }

    async fn create_credential(&self, credential: CredentialRecord) -> Result<()> {
        self.credentials.insert_one(CredentialDoc::new(credential)).await
    }

    async fn get_credential(&self, id: &str) -> Result<Option<CredentialRecord>> {
        let found = self.credentials.find_one(doc! { "_id": id }).await?;
        Ok(found.map(|d| d.credential))
    }

    async fn delete_credential(&self, id: &str) -> Result<bool> {
        let removed = self.transfers.delete_many(doc! { "credentialId": id }).await?;
        debug!(credential_id = %id, transfers = removed, "Removed credential transfers");

        Ok(self.credentials.delete_many(doc! { "_id": id }).await? > 0)
    }

    async fn create_transfer(&self, transfer: Transfer) -> Result<()> {
        let credential_id = transfer.credential_id.clone();
        let to = transfer.to.clone();

        self.transfers
            .insert_one(TransferDoc::new(transfer))
            .await
            .map_err(|e| match e {
                BrainError::Conflict(_) => BrainError::Conflict(format!(
                    "Credential {} was already sent to {}",
                    credential_id, to
                )),
                other => other,
            })
    }

    async fn get_transfer(&self, credential_id: &str, to: &str) -> Result<Option<Transfer>> {
        let found = self
            .transfers
            .find_one(doc! { "_id": TransferDoc::key(credential_id, to) })
            .await?;
        Ok(found.map(TransferDoc::into_transfer))
    }

    async fn mark_received(
        &self,
        credential_id: &str,
        to: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let received_at = bson::DateTime::from_chrono(at);

        // The null filter makes this a compare-and-set: only one accept can match
        let result = self
            .transfers
            .update_one(
                doc! {
                    "_id": TransferDoc::key(credential_id, to),
                    "receivedAt": null,
                },
                doc! {
                    "$set": {
                        "receivedAt": received_at,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;

        Ok(result.modified_count > 0)
    }

    async fn unmark_received(&self, credential_id: &str, to: &str) -> Result<()> {
        self.transfers
            .update_one(
                doc! { "_id": TransferDoc::key(credential_id, to) },
                doc! { "$unset": { "receivedAt": "" } },
            )
            .await?;
        Ok(())
    }

    async fn transfers(&self, query: TransferQuery) -> Result<Vec<Transfer>> {
        let mut filter = doc! {};
        if let Some(from) = &query.from {
            filter.insert("from", doc! { "$in": from.clone() });
        }
        if let Some(to) = &query.to {
            filter.insert("to", doc! { "$in": to.clone() });
        }
        match query.received {
            Some(true) => {
                filter.insert("receivedAt", doc! { "$ne": null });
            }
            Some(false) => {
                filter.insert("receivedAt", bson::Bson::Null);
            }
            None => {}
        }

        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let found = self
            .transfers
            .find_sorted(filter, doc! { "sentAt": -1 }, limit)
            .await?;

        Ok(found.into_iter().map(TransferDoc::into_transfer).collect())
    }

    async fn store_document(
        &self,
        kind: ResourceKind,
        id: &str,
        document: serde_json::Value,
    ) -> Result<()> {
        let key = ResourceDoc::key(kind, id);
        let doc = ResourceDoc {
            _id: key.clone(),
            metadata: Metadata::new(),
            kind,
            body: document,
        };
        let mut encoded = bson::to_document(&doc)
            .map_err(|e| BrainError::Internal(format!("Failed to encode document: {}", e)))?;
        encoded.remove("_id");

        self.resources
            .upsert_one(doc! { "_id": key }, doc! { "$set": encoded })
            .await
    }

    async fn get_document(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>> {
        let found = self
            .resources
            .find_one(doc! { "_id": ResourceDoc::key(kind, id) })
            .await?;
        Ok(found.map(|d| d.body))
    }
}
