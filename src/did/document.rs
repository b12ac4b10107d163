//! did:web document generation
//!
//! A did:web document is the subject's did:key document with every
//! reference to the did:key rewritten to the did:web, plus an X25519
//! key agreement key derived from the Ed25519 verification key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::VerifyingKey;
use serde_json::{json, Value};

use crate::identity::resolver::X25519_MULTICODEC;
use crate::identity::DidCapability;
use crate::types::{BrainError, Result};
use crate::uri::escape_localhost;

/// Fragment every rewritten verification method is renamed to
const OWNER_FRAGMENT: &str = "#owner";

/// Whose document is being served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DidSubject {
    /// The server itself
    Root,
    /// A profile, by handle
    Profile(String),
    /// A profile manager, by id
    Manager(String),
}

impl DidSubject {
    /// The did:web of this subject on `domain`
    pub fn did_web(&self, domain: &str) -> String {
        let domain = escape_localhost(domain);
        match self {
            Self::Root => format!("did:web:{}", domain),
            Self::Profile(id) => format!("did:web:{}:users:{}", domain, id),
            Self::Manager(id) => format!("did:web:{}:manager:{}", domain, id),
        }
    }

    pub fn cache_key(&self) -> String {
        match self {
            Self::Root => super::cache::ROOT_KEY.to_string(),
            Self::Profile(id) => id.clone(),
            Self::Manager(id) => super::cache::manager_key(id),
        }
    }
}

/// Rewrite a did:key document into the did:web document
pub fn rewrite(document: &Value, did_key: &str, did_web: &str) -> Result<Value> {
    let fragment = did_key.trim_start_matches("did:key:");

    let text = document
        .to_string()
        .replace(did_key, did_web)
        .replace(&format!("#{}", fragment), OWNER_FRAGMENT);

    Ok(serde_json::from_str(&text)?)
}

/// Convert an Ed25519 public key to its X25519 (Montgomery) form
pub fn ed25519_to_x25519(public_key: &[u8; 32]) -> Result<[u8; 32]> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| BrainError::Internal(format!("Invalid Ed25519 key: {}", e)))?;
    Ok(verifying_key.to_montgomery().to_bytes())
}

/// Set `keyAgreement` to the X25519 key derived from the first verification method
pub fn add_key_agreement(document: &mut Value, did: &str) -> Result<()> {
    let x = document
        .pointer("/verificationMethod/0/publicKeyJwk/x")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            BrainError::Internal("DID document has no Ed25519 publicKeyJwk".to_string())
        })?;

    let bytes = URL_SAFE_NO_PAD
        .decode(x.trim_end_matches('='))
        .map_err(|e| BrainError::Internal(format!("Invalid publicKeyJwk.x: {}", e)))?;
    let public_key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| BrainError::Internal("publicKeyJwk.x is not 32 bytes".to_string()))?;

    let x25519 = ed25519_to_x25519(&public_key)?;

    let mut multicodec = X25519_MULTICODEC.to_vec();
    multicodec.extend_from_slice(&x25519);
    let key_id = format!("{}#z{}", did, bs58::encode(multicodec).into_string());

    let entry = json!({
        "id": key_id,
        "type": "X25519KeyAgreementKey2019",
        "controller": did,
        "publicKeyBase58": bs58::encode(x25519).into_string(),
    });

    let object = document
        .as_object_mut()
        .ok_or_else(|| BrainError::Internal("DID document is not an object".to_string()))?;

    object.insert("keyAgreement".to_string(), json!([entry]));

    Ok(())
}

/// Generate the did:web document of a subject controlled by `did_key`
pub async fn generate(
    identity: &dyn DidCapability,
    subject: &DidSubject,
    did_key: &str,
    domain: &str,
) -> Result<Value> {
    let did_web = subject.did_web(domain);
    let resolved = identity.resolve_did(did_key).await?;

    let mut document = rewrite(&resolved, did_key, &did_web)?;
    add_key_agreement(&mut document, &did_web)?;

    if *subject != DidSubject::Root {
        if let Some(object) = document.as_object_mut() {
            object.insert("controller".to_string(), Value::String(did_key.to_string()));
        }
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{resolver::resolve_did_key, DidResolver, Ed25519Identity};
    use std::sync::Arc;

    const DID_KEY: &str = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";

    #[test]
    fn test_did_web_formats() {
        assert_eq!(DidSubject::Root.did_web("example.com"), "did:web:example.com");
        assert_eq!(
            DidSubject::Profile("usera".into()).did_web("localhost:3000"),
            "did:web:localhost%3A3000:users:usera"
        );
        assert_eq!(
            DidSubject::Manager("m1".into()).did_web("example.com"),
            "did:web:example.com:manager:m1"
        );
    }

    #[test]
    fn test_rewrite_replaces_did_and_fragment() {
        let document = resolve_did_key(DID_KEY).unwrap();
        let rewritten = rewrite(&document, DID_KEY, "did:web:example.com").unwrap();

        assert_eq!(rewritten["id"], "did:web:example.com");
        assert_eq!(rewritten["verificationMethod"][0]["id"], "did:web:example.com#owner");
        assert_eq!(rewritten["authentication"][0], "did:web:example.com#owner");
        assert!(!rewritten.to_string().contains("did:key"));
    }

    #[test]
    fn test_key_agreement_is_derived() {
        let mut document =
            rewrite(&resolve_did_key(DID_KEY).unwrap(), DID_KEY, "did:web:example.com").unwrap();
        add_key_agreement(&mut document, "did:web:example.com").unwrap();

        let agreement = &document["keyAgreement"][0];
        assert_eq!(agreement["type"], "X25519KeyAgreementKey2019");
        assert_eq!(agreement["controller"], "did:web:example.com");

        let id = agreement["id"].as_str().unwrap();
        assert!(id.starts_with("did:web:example.com#z6LS"));

        let base58 = agreement["publicKeyBase58"].as_str().unwrap();
        assert_eq!(bs58::decode(base58).into_vec().unwrap().len(), 32);
    }

    #[test]
    fn test_key_agreement_replaces_existing_entries() {
        let mut document =
            rewrite(&resolve_did_key(DID_KEY).unwrap(), DID_KEY, "did:web:example.com").unwrap();
        document["keyAgreement"] = json!([{ "id": "did:key:stale#x", "type": "X25519KeyAgreementKey2019" }]);

        add_key_agreement(&mut document, "did:web:example.com").unwrap();
        add_key_agreement(&mut document, "did:web:example.com").unwrap();

        let agreement = document["keyAgreement"].as_array().unwrap();
        assert_eq!(agreement.len(), 1);
        assert!(agreement[0]["id"]
            .as_str()
            .unwrap()
            .starts_with("did:web:example.com#z6LS"));
    }

    #[test]
    fn test_missing_jwk_is_an_error() {
        let mut document = json!({ "id": "did:web:x", "verificationMethod": [] });
        assert!(add_key_agreement(&mut document, "did:web:x").is_err());
    }

    #[tokio::test]
    async fn test_profile_documents_carry_controller() {
        let identity = Ed25519Identity::from_seed([3u8; 32], Arc::new(DidResolver::new()));

        let profile = generate(&identity, &DidSubject::Profile("usera".into()), DID_KEY, "example.com")
            .await
            .unwrap();
        assert_eq!(profile["id"], "did:web:example.com:users:usera");
        assert_eq!(profile["controller"], DID_KEY);

        let root = generate(&identity, &DidSubject::Root, &identity.did(), "example.com")
            .await
            .unwrap();
        assert_eq!(root["id"], "did:web:example.com");
        assert!(root.get("controller").is_none());
    }
}
