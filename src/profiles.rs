//! Profile management

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::did::{DidDocService, DidSubject};
use crate::graph::{GraphStore, Profile};
use crate::types::{BrainError, Result};

const MIN_HANDLE_LEN: usize = 3;
const MAX_HANDLE_LEN: usize = 40;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub profile_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub short_bio: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Fields to change; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub short_bio: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Handles are case-insensitive and URL-safe
pub fn normalize_handle(handle: &str) -> Result<String> {
    let handle = handle.trim().to_lowercase();

    if handle.len() < MIN_HANDLE_LEN || handle.len() > MAX_HANDLE_LEN {
        return Err(BrainError::BadRequest(format!(
            "Profile handle must be {}-{} characters",
            MIN_HANDLE_LEN, MAX_HANDLE_LEN
        )));
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(BrainError::BadRequest(
            "Profile handle may only contain letters, digits, '-' and '_'".into(),
        ));
    }

    Ok(handle)
}

pub struct ProfileService {
    graph: Arc<dyn GraphStore>,
    did_docs: Arc<DidDocService>,
}

impl ProfileService {
    pub fn new(graph: Arc<dyn GraphStore>, did_docs: Arc<DidDocService>) -> Self {
        Self { graph, did_docs }
    }

    /// Register a profile for `did`. Returns the profile's did:web.
    pub async fn create(&self, did: &str, new: NewProfile, domain: &str) -> Result<String> {
        if !did.starts_with("did:key:") {
            return Err(BrainError::BadRequest(
                "Profiles must be controlled by a did:key".into(),
            ));
        }

        let profile_id = normalize_handle(&new.profile_id)?;

        if self.graph.get_profile_by_did(did).await?.is_some() {
            return Err(BrainError::Conflict("Profile already exists!".into()));
        }

        self.graph
            .create_profile(Profile {
                profile_id: profile_id.clone(),
                did: did.to_string(),
                display_name: new.display_name,
                short_bio: new.short_bio,
                email: new.email,
                image: new.image,
                created_at: Utc::now(),
            })
            .await?;

        info!(profile_id = %profile_id, "Created profile");
        Ok(DidSubject::Profile(profile_id).did_web(domain))
    }

    pub async fn get_by_handle(&self, handle: &str) -> Result<Profile> {
        let handle = handle.to_lowercase();
        self.graph
            .get_profile(&handle)
            .await?
            .ok_or_else(|| BrainError::NotFound(format!("Profile {}", handle)))
    }

    /// The caller's own profile
    pub async fn get_by_did(&self, did: &str) -> Result<Profile> {
        self.graph
            .get_profile_by_did(did)
            .await?
            .ok_or_else(|| BrainError::NotFound("Profile not found. Are you sure this profile exists?".into()))
    }

    pub async fn update(&self, did: &str, update: ProfileUpdate) -> Result<Profile> {
        let mut profile = self.get_by_did(did).await?;

        if let Some(display_name) = update.display_name {
            profile.display_name = display_name;
        }
        if let Some(short_bio) = update.short_bio {
            profile.short_bio = short_bio;
        }
        if let Some(email) = update.email {
            profile.email = Some(email);
        }
        if let Some(image) = update.image {
            profile.image = Some(image);
        }

        self.graph.update_profile(profile.clone()).await?;
        self.forget_document(&profile.profile_id).await;

        info!(profile_id = %profile.profile_id, "Updated profile");
        Ok(profile)
    }

    /// Soft-delete the caller's profile
    pub async fn delete(&self, did: &str) -> Result<()> {
        let profile = self.get_by_did(did).await?;

        if !self.graph.delete_profile(&profile.profile_id).await? {
            return Err(BrainError::NotFound(format!("Profile {}", profile.profile_id)));
        }
        self.forget_document(&profile.profile_id).await;

        info!(profile_id = %profile.profile_id, "Deleted profile");
        Ok(())
    }

    async fn forget_document(&self, profile_id: &str) {
        let key = DidSubject::Profile(profile_id.to_string()).cache_key();
        if let Err(e) = self.did_docs.invalidate(&key).await {
            warn!(profile_id = %profile_id, error = %e, "Failed to invalidate DID document");
        }
    }
}
