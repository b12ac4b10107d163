use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::claim_hooks::ClaimHookEngine;
use crate::graph::{CredentialRecord, GraphStore, Profile, RoleGrant, Transfer, TransferQuery};
use crate::notifications::{
    Notification, NotificationData, NotificationMessage, NotificationParty, NotificationQueue,
    NotificationType,
};
use crate::types::{BrainError, Result};
use crate::uri::{self, ResourceKind};

/// A transfer as seen by either party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentCredentialInfo {
    pub uri: String,
    pub to: String,
    pub from: String,
    pub sent: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SentCredentialInfo {
    fn from_transfer(transfer: Transfer, domain: &str) -> Self {
        Self {
            uri: uri::construct(ResourceKind::Credential, &transfer.credential_id, domain),
            to: transfer.to,
            from: transfer.from,
            sent: transfer.sent_at,
            received: transfer.received_at,
            metadata: transfer.metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOptions {
    #[serde(default)]
    pub skip_notification: bool,
}

/// Sends, accepts, lists and deletes credentials
#[derive(Clone)]
pub struct CredentialEngine {
    graph: Arc<dyn GraphStore>,
    hooks: Arc<ClaimHookEngine>,
    notifications: NotificationQueue,
}

impl CredentialEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        hooks: Arc<ClaimHookEngine>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            graph,
            hooks,
            notifications,
        }
    }

    /// Store a credential and send it to `to`. Returns its URI.
    pub async fn send(
        &self,
        from: &Profile,
        to: &str,
        credential: Value,
        boost_id: Option<&str>,
        domain: &str,
        metadata: Option<Value>,
    ) -> Result<String> {
        let recipient = self
            .graph
            .get_profile(to)
            .await?
            .ok_or_else(|| BrainError::NotFound(format!("Profile {}", to)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        self.graph
            .create_credential(CredentialRecord {
                id: id.clone(),
                payload: credential,
                boost_id: boost_id.map(String::from),
                issuer: from.profile_id.clone(),
                created_at: now,
            })
            .await?;

        self.graph
            .create_transfer(Transfer {
                credential_id: id.clone(),
                from: from.profile_id.clone(),
                to: recipient.profile_id.clone(),
                sent_at: now,
                received_at: None,
                metadata,
            })
            .await?;

        let uri = uri::construct(ResourceKind::Credential, &id, domain);
        info!(uri = %uri, from = %from.profile_id, to = %recipient.profile_id, "Credential sent");

        let (notification_type, title) = if boost_id.is_some() {
            (NotificationType::BoostReceived, "Boost Received")
        } else {
            (NotificationType::CredentialReceived, "Credential Received")
        };
        self.notifications.enqueue(Notification::new(
            notification_type,
            NotificationParty::from(&recipient),
            NotificationParty::from(from),
            NotificationMessage {
                title: Some(title.to_string()),
                body: Some(format!(
                    "{} has sent you a credential",
                    display_name(from)
                )),
            },
            NotificationData {
                vc_uris: Some(vec![uri.clone()]),
                metadata: None,
            },
        ));

        Ok(uri)
    }

    /// Accept a credential sent to `profile`.
    ///
    /// `NotFound` if it was never sent to this profile, `BadRequest` if it
    /// was already accepted. If a claim hook fails the acceptance is rolled
    /// back so the call can be retried. Once the transfer is marked, the
    /// rest runs in its own task and completes even if the caller is
    /// cancelled.
    pub async fn accept(
        &self,
        profile: &Profile,
        credential_uri: &str,
        domain: &str,
        options: AcceptOptions,
    ) -> Result<bool> {
        let parsed = uri::parse(credential_uri, domain)?;
        parsed.expect_kind(ResourceKind::Credential)?;

        let transfer = self
            .graph
            .get_transfer(&parsed.id, &profile.profile_id)
            .await?
            .ok_or_else(|| BrainError::NotFound("Pending credential not found".into()))?;

        if transfer.is_received() {
            return Err(BrainError::BadRequest(
                "Credential has already been received".into(),
            ));
        }

        let credential = self
            .graph
            .get_credential(&parsed.id)
            .await?
            .ok_or_else(|| BrainError::NotFound(format!("Credential {}", parsed.id)))?;

        let engine = self.clone();
        let profile = profile.clone();
        let credential_uri = credential_uri.to_string();

        tokio::spawn(async move {
            engine
                .settle(&profile, transfer, credential, &credential_uri, options)
                .await
        })
        .await
        .map_err(|e| BrainError::Internal(format!("Accept task failed: {}", e)))?
    }

    /// Mark received, claim, and roll the mark back if the claim fails
    async fn settle(
        &self,
        profile: &Profile,
        transfer: Transfer,
        credential: CredentialRecord,
        credential_uri: &str,
        options: AcceptOptions,
    ) -> Result<bool> {
        if !self
            .graph
            .mark_received(&credential.id, &profile.profile_id, Utc::now())
            .await?
        {
            // Lost a race with a concurrent accept
            return Err(BrainError::BadRequest(
                "Credential has already been received".into(),
            ));
        }

        if let Err(e) = self.claim(profile, &credential).await {
            warn!(uri = %credential_uri, error = %e, "Claim failed, rolling back acceptance");
            self.graph
                .unmark_received(&credential.id, &profile.profile_id)
                .await?;
            return Err(e);
        }

        info!(uri = %credential_uri, profile_id = %profile.profile_id, "Credential accepted");

        if !options.skip_notification {
            self.notify_accepted(profile, &transfer, &credential, credential_uri)
                .await;
        }

        Ok(true)
    }

    /// Hooks plus the boost's default claim role
    async fn claim(&self, profile: &Profile, credential: &CredentialRecord) -> Result<()> {
        self.hooks.process(&profile.profile_id, credential).await?;

        let Some(boost_id) = credential.boost_id.as_deref() else {
            return Ok(());
        };

        if let Some(role_id) = self
            .graph
            .get_boost(boost_id)
            .await?
            .and_then(|boost| boost.claim_role)
        {
            self.graph
                .grant_role(RoleGrant {
                    profile_id: profile.profile_id.clone(),
                    boost_id: boost_id.to_string(),
                    role_id,
                })
                .await?;
        }
        Ok(())
    }

    async fn notify_accepted(
        &self,
        profile: &Profile,
        transfer: &Transfer,
        credential: &CredentialRecord,
        credential_uri: &str,
    ) {
        let sender = match self.graph.get_profile(&transfer.from).await {
            Ok(Some(sender)) => sender,
            Ok(None) => {
                warn!(from = %transfer.from, "Sender no longer exists, skipping notification");
                return;
            }
            Err(e) => {
                warn!(from = %transfer.from, error = %e, "Failed to load sender, skipping notification");
                return;
            }
        };

        let (notification_type, title) = if credential.boost_id.is_some() {
            (NotificationType::BoostAccepted, "Boost Accepted")
        } else {
            (NotificationType::CredentialAccepted, "Credential Accepted")
        };

        self.notifications.enqueue(Notification::new(
            notification_type,
            NotificationParty::from(&sender),
            NotificationParty::from(profile),
            NotificationMessage {
                title: Some(title.to_string()),
                body: Some(format!(
                    "{} has accepted your credential",
                    display_name(profile)
                )),
            },
            NotificationData {
                vc_uris: Some(vec![credential_uri.to_string()]),
                metadata: None,
            },
        ));
    }

    /// Credentials `profile_id` has accepted, newest first
    pub async fn received(
        &self,
        profile_id: &str,
        limit: usize,
        from: Option<Vec<String>>,
        domain: &str,
    ) -> Result<Vec<SentCredentialInfo>> {
        self.list(
            TransferQuery {
                from,
                to: Some(vec![profile_id.to_string()]),
                received: Some(true),
                limit,
            },
            domain,
        )
        .await
    }

    /// Credentials `profile_id` has sent, accepted or not
    pub async fn sent(
        &self,
        profile_id: &str,
        limit: usize,
        to: Option<Vec<String>>,
        domain: &str,
    ) -> Result<Vec<SentCredentialInfo>> {
        self.list(
            TransferQuery {
                from: Some(vec![profile_id.to_string()]),
                to,
                received: None,
                limit,
            },
            domain,
        )
        .await
    }

    /// Credentials waiting for `profile_id` to accept them
    pub async fn incoming(
        &self,
        profile_id: &str,
        limit: usize,
        from: Option<Vec<String>>,
        domain: &str,
    ) -> Result<Vec<SentCredentialInfo>> {
        self.list(
            TransferQuery {
                from,
                to: Some(vec![profile_id.to_string()]),
                received: Some(false),
                limit,
            },
            domain,
        )
        .await
    }

    async fn list(&self, query: TransferQuery, domain: &str) -> Result<Vec<SentCredentialInfo>> {
        Ok(self
            .graph
            .transfers(query)
            .await?
            .into_iter()
            .map(|t| SentCredentialInfo::from_transfer(t, domain))
            .collect())
    }

    /// The credential a URI addresses
    pub async fn get(&self, credential_uri: &str, domain: &str) -> Result<Value> {
        let parsed = uri::parse(credential_uri, domain)?;
        parsed.expect_kind(ResourceKind::Credential)?;

        self.graph
            .get_credential(&parsed.id)
            .await?
            .map(|c| c.payload)
            .ok_or_else(|| BrainError::NotFound(format!("Credential {}", parsed.id)))
    }

    /// Delete a credential the profile issued, with all its transfers
    pub async fn delete(&self, profile_id: &str, credential_uri: &str, domain: &str) -> Result<()> {
        let parsed = uri::parse(credential_uri, domain)?;
        parsed.expect_kind(ResourceKind::Credential)?;

        let credential = self
            .graph
            .get_credential(&parsed.id)
            .await?
            .ok_or_else(|| BrainError::NotFound(format!("Credential {}", parsed.id)))?;

        if credential.issuer != profile_id {
            return Err(BrainError::Unauthorized(
                "Profile does not own this credential".into(),
            ));
        }

        self.graph.delete_credential(&parsed.id).await?;
        info!(uri = %credential_uri, "Credential deleted");
        Ok(())
    }
}

fn display_name(profile: &Profile) -> &str {
    if profile.display_name.is_empty() {
        &profile.profile_id
    } else {
        &profile.display_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{DidDocService, MemoryDidCache, MemoryLock};
    use crate::graph::{
        ClaimHook, ClaimHookType, MemoryGraph, ProfileManager, Role,
    };
    use crate::identity::{DidResolver, Ed25519Identity};
    use crate::notifications::RecordingSink;
    use serde_json::json;

    const DOMAIN: &str = "localhost:3000";

    enum HookFault {
        Fail,
        Slow(std::time::Duration),
    }

    /// Delegates to a memory graph, except that reading claim hooks fails or stalls
    struct FaultyHooksGraph(MemoryGraph, HookFault);

    #[async_trait::async_trait]
    impl GraphStore for FaultyHooksGraph {
        async fn create_profile(&self, p: Profile) -> Result<()> { self.0.create_profile(p).await }
        async fn update_profile(&self, p: Profile) -> Result<()> { self.0.update_profile(p).await }
        async fn get_profile(&self, id: &str) -> Result<Option<Profile>> { self.0.get_profile(id).await }
        async fn get_profile_by_did(&self, did: &str) -> Result<Option<Profile>> { self.0.get_profile_by_did(did).await }
        async fn delete_profile(&self, id: &str) -> Result<bool> { self.0.delete_profile(id).await }
        async fn create_profile_manager(&self, m: ProfileManager) -> Result<()> { self.0.create_profile_manager(m).await }
        async fn get_profile_manager(&self, id: &str) -> Result<Option<ProfileManager>> { self.0.get_profile_manager(id).await }
        async fn child_profile_managers(&self, b: &str) -> Result<Vec<ProfileManager>> { self.0.child_profile_managers(b).await }
        async fn create_boost(&self, b: crate::graph::Boost) -> Result<()> { self.0.create_boost(b).await }
        async fn get_boost(&self, id: &str) -> Result<Option<crate::graph::Boost>> { self.0.get_boost(id).await }
        async fn create_role(&self, r: Role) -> Result<()> { self.0.create_role(r).await }
        async fn get_role(&self, id: &str) -> Result<Option<Role>> { self.0.get_role(id).await }
        async fn grant_role(&self, g: RoleGrant) -> Result<()> { self.0.grant_role(g).await }
        async fn roles_for_profile(&self, p: &str, b: &str) -> Result<Vec<Role>> { self.0.roles_for_profile(p, b).await }
        async fn create_claim_hook(&self, h: ClaimHook) -> Result<()> { self.0.create_claim_hook(h).await }
        async fn get_claim_hook(&self, id: &str) -> Result<Option<ClaimHook>> { self.0.get_claim_hook(id).await }
        async fn claim_hooks_for(&self, b: &str, t: Option<ClaimHookType>) -> Result<Vec<ClaimHook>> {
            match self.1 {
                HookFault::Fail => Err(BrainError::Database("hooks unavailable".into())),
                HookFault::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    self.0.claim_hooks_for(b, t).await
                }
            }
        }
        async fn delete_claim_hook(&self, id: &str) -> Result<bool> { self.0.delete_claim_hook(id).await }
        async fn add_auto_connect_recipient(&self, b: &str, p: &str) -> Result<()> { self.0.add_auto_connect_recipient(b, p).await }
        async fn auto_connect_recipients(&self, b: &str) -> Result<Vec<String>> { self.0.auto_connect_recipients(b).await }
        async fn create_credential(&self, c: CredentialRecord) -> Result<()> { self.0.create_credential(c).await }
        async fn get_credential(&self, id: &str) -> Result<Option<CredentialRecord>> { self.0.get_credential(id).await }
        async fn delete_credential(&self, id: &str) -> Result<bool> { self.0.delete_credential(id).await }
        async fn create_transfer(&self, t: Transfer) -> Result<()> { self.0.create_transfer(t).await }
        async fn get_transfer(&self, c: &str, to: &str) -> Result<Option<Transfer>> { self.0.get_transfer(c, to).await }
        async fn mark_received(&self, c: &str, to: &str, at: DateTime<Utc>) -> Result<bool> { self.0.mark_received(c, to, at).await }
        async fn unmark_received(&self, c: &str, to: &str) -> Result<()> { self.0.unmark_received(c, to).await }
        async fn transfers(&self, q: TransferQuery) -> Result<Vec<Transfer>> { self.0.transfers(q).await }
        async fn store_document(&self, k: ResourceKind, id: &str, d: Value) -> Result<()> { self.0.store_document(k, id, d).await }
        async fn get_document(&self, k: ResourceKind, id: &str) -> Result<Option<Value>> { self.0.get_document(k, id).await }
    }

    fn profile(id: &str) -> Profile {
        let seed = [id.len() as u8; 32];
        let key = ed25519_dalek::SigningKey::from_bytes(&seed);
        Profile {
            profile_id: id.to_string(),
            did: crate::identity::encode_did_key(key.verifying_key().as_bytes()),
            display_name: String::new(),
            short_bio: String::new(),
            email: None,
            image: None,
            created_at: Utc::now(),
        }
    }

    async fn engine_over(graph: Arc<dyn GraphStore>) -> (CredentialEngine, Arc<RecordingSink>) {
        graph.create_profile(profile("usera")).await.unwrap();
        graph.create_profile(profile("userbb")).await.unwrap();

        let did_docs = Arc::new(DidDocService::new(
            graph.clone(),
            Arc::new(Ed25519Identity::from_seed([8u8; 32], Arc::new(DidResolver::new()))),
            Arc::new(MemoryDidCache::default()),
            Arc::new(MemoryLock::default()),
        ));
        let hooks = Arc::new(ClaimHookEngine::new(graph.clone(), did_docs));
        let sink = Arc::new(RecordingSink::new());
        let (queue, _handle) = NotificationQueue::spawn(16, sink.clone());

        (CredentialEngine::new(graph, hooks, queue), sink)
    }

    async fn engine() -> (CredentialEngine, Arc<RecordingSink>) {
        engine_over(Arc::new(MemoryGraph::new())).await
    }

    #[tokio::test]
    async fn test_send_then_accept() {
        let (engine, sink) = engine().await;
        let sender = profile("usera");
        let recipient = profile("userbb");

        let uri = engine
            .send(&sender, "userbb", json!({ "name": "Cert" }), None, DOMAIN, None)
            .await
            .unwrap();
        assert!(uri.starts_with("lc:network:localhost%3A3000/trpc:credential:"));

        let incoming = engine.incoming("userbb", 25, None, DOMAIN).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].uri, uri);
        assert!(incoming[0].received.is_none());

        assert!(engine
            .accept(&recipient, &uri, DOMAIN, AcceptOptions::default())
            .await
            .unwrap());

        assert!(engine.incoming("userbb", 25, None, DOMAIN).await.unwrap().is_empty());
        let received = engine.received("userbb", 25, None, DOMAIN).await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].received.is_some());
        assert_eq!(engine.sent("usera", 25, None, DOMAIN).await.unwrap().len(), 1);

        assert_eq!(engine.get(&uri, DOMAIN).await.unwrap()["name"], "Cert");

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let types: Vec<_> = sink.delivered().iter().map(|n| n.notification_type).collect();
        assert_eq!(
            types,
            vec![NotificationType::CredentialReceived, NotificationType::CredentialAccepted]
        );
    }

    #[tokio::test]
    async fn test_double_accept_is_rejected() {
        let (engine, _) = engine().await;
        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), None, DOMAIN, None)
            .await
            .unwrap();

        let recipient = profile("userbb");
        engine.accept(&recipient, &uri, DOMAIN, AcceptOptions::default()).await.unwrap();

        let err = engine
            .accept(&recipient, &uri, DOMAIN, AcceptOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_succeed_once() {
        let (engine, _) = engine().await;
        let engine = Arc::new(engine);
        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), None, DOMAIN, None)
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let uri = uri.clone();
                tokio::spawn(async move {
                    engine
                        .accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default())
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(true) => accepted += 1,
                Err(BrainError::BadRequest(_)) => {}
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_accept_without_send_is_not_found() {
        let (engine, _) = engine().await;
        let uri = uri::construct(ResourceKind::Credential, "never-sent", DOMAIN);

        let err = engine
            .accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_accept_rejects_other_kinds() {
        let (engine, _) = engine().await;
        let uri = uri::construct(ResourceKind::Boost, "b1", DOMAIN);

        let err = engine
            .accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_failed_claim_rolls_back() {
        let (engine, _) =
            engine_over(Arc::new(FaultyHooksGraph(MemoryGraph::new(), HookFault::Fail))).await;
        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), Some("b1"), DOMAIN, None)
            .await
            .unwrap();

        let err = engine
            .accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::Internal(_)));

        // Still pending, so it can be retried
        assert_eq!(engine.incoming("userbb", 25, None, DOMAIN).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_accept_still_claims() {
        let graph: Arc<dyn GraphStore> = Arc::new(FaultyHooksGraph(
            MemoryGraph::new(),
            HookFault::Slow(std::time::Duration::from_millis(150)),
        ));
        let (engine, _) = engine_over(graph.clone()).await;

        graph
            .create_role(Role {
                id: "claimers".into(),
                permissions: crate::graph::BoostPermissions::default(),
            })
            .await
            .unwrap();
        graph
            .create_boost(crate::graph::Boost {
                id: "b1".into(),
                owner: "usera".into(),
                name: "Badge".into(),
                category: None,
                template: "{}".into(),
                claim_role: Some("claimers".into()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), Some("b1"), DOMAIN, None)
            .await
            .unwrap();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            engine.accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default()),
        )
        .await;
        assert!(timed_out.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;

        // The claim ran to completion behind the dropped request
        let roles = graph.roles_for_profile("userbb", "b1").await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].id, "claimers");
        assert_eq!(engine.received("userbb", 25, None, DOMAIN).await.unwrap().len(), 1);
        assert!(engine.incoming("userbb", 25, None, DOMAIN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_failing_accept_can_be_retried() {
        let graph = Arc::new(FaultyHooksGraph(MemoryGraph::new(), HookFault::Fail));
        let (engine, _) = engine_over(graph).await;
        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), Some("b1"), DOMAIN, None)
            .await
            .unwrap();

        // Cancel before the task can finish; the rollback still happens
        let _ = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            engine.accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default()),
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(engine.incoming("userbb", 25, None, DOMAIN).await.unwrap().len(), 1);
        assert!(matches!(
            engine
                .accept(&profile("userbb"), &uri, DOMAIN, AcceptOptions::default())
                .await,
            Err(BrainError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_skip_notification_and_boost_types() {
        let (engine, sink) = engine().await;
        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), Some("b1"), DOMAIN, None)
            .await
            .unwrap();
        engine
            .accept(
                &profile("userbb"),
                &uri,
                DOMAIN,
                AcceptOptions {
                    skip_notification: true,
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let types: Vec<_> = sink.delivered().iter().map(|n| n.notification_type).collect();
        assert_eq!(types, vec![NotificationType::BoostReceived]);
    }

    #[tokio::test]
    async fn test_only_the_issuer_can_delete() {
        let (engine, _) = engine().await;
        let uri = engine
            .send(&profile("usera"), "userbb", json!({}), None, DOMAIN, None)
            .await
            .unwrap();

        assert!(matches!(
            engine.delete("userbb", &uri, DOMAIN).await,
            Err(BrainError::Unauthorized(_))
        ));
        engine.delete("usera", &uri, DOMAIN).await.unwrap();

        assert!(matches!(engine.get(&uri, DOMAIN).await, Err(BrainError::NotFound(_))));
        assert!(matches!(
            engine.delete("usera", &uri, DOMAIN).await,
            Err(BrainError::NotFound(_))
        ));
        assert!(engine.sent("usera", 25, None, DOMAIN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_unknown_profile() {
        let (engine, _) = engine().await;
        assert!(matches!(
            engine.send(&profile("usera"), "ghost", json!({}), None, DOMAIN, None).await,
            Err(BrainError::NotFound(_))
        ));
    }
}
