//! DID resolution
//!
//! `did:key` DIDs are self-describing and resolve locally. `did:web` DIDs
//! are fetched over HTTP. Results are cached for a short TTL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::{BrainError, Result};

/// Multicodec prefix of an Ed25519 public key
pub const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Multicodec prefix of an X25519 public key
pub const X25519_MULTICODEC: [u8; 2] = [0xec, 0x01];

#[derive(Debug, Clone)]
pub struct DidResolverConfig {
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub max_cache_entries: usize,
}

impl Default for DidResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
            max_cache_entries: 1000,
        }
    }
}

struct CachedDocument {
    document: Value,
    expires_at: Instant,
}

/// Resolves DIDs to DID documents (as JSON)
pub struct DidResolver {
    config: DidResolverConfig,
    cache: RwLock<HashMap<String, CachedDocument>>,
    http_client: reqwest::Client,
}

impl DidResolver {
    pub fn new() -> Self {
        Self::with_config(DidResolverConfig::default())
    }

    pub fn with_config(config: DidResolverConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("lcn-brain/1.0")
            .build()
            .unwrap_or_default();

        Self {
            config,
            cache: RwLock::new(HashMap::new()),
            http_client,
        }
    }

    /// Resolve a DID to its document
    pub async fn resolve(&self, did: &str) -> Result<Value> {
        if let Some(doc) = self.get_cached(did).await {
            debug!(did = %did, "DID resolved from cache");
            return Ok(doc);
        }

        let document = if did.starts_with("did:web:") {
            self.resolve_did_web(did).await?
        } else if did.starts_with("did:key:") {
            resolve_did_key(did)?
        } else {
            return Err(BrainError::BadRequest(format!(
                "Unsupported DID method: {}",
                did
            )));
        };

        self.cache_document(did, document.clone()).await;

        Ok(document)
    }

    /// Shared HTTP client, also used for off-network URI resolution
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    async fn get_cached(&self, did: &str) -> Option<Value> {
        let cache = self.cache.read().await;
        cache.get(did).and_then(|cached| {
            if cached.expires_at > Instant::now() {
                Some(cached.document.clone())
            } else {
                None
            }
        })
    }

    async fn cache_document(&self, did: &str, document: Value) {
        let mut cache = self.cache.write().await;

        if cache.len() >= self.config.max_cache_entries {
            cache.retain(|_, v| v.expires_at > Instant::now());

            if cache.len() >= self.config.max_cache_entries {
                let to_remove: Vec<_> = cache.keys().take(cache.len() / 2).cloned().collect();
                for key in to_remove {
                    cache.remove(&key);
                }
            }
        }

        cache.insert(
            did.to_string(),
            CachedDocument {
                document,
                expires_at: Instant::now() + self.config.cache_ttl,
            },
        );
    }

    async fn resolve_did_web(&self, did: &str) -> Result<Value> {
        let url = did_web_to_url(did)?;
        debug!(did = %did, url = %url, "Resolving did:web");

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/did+ld+json, application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrainError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let document: Value = response.json().await?;

        if document.get("id").and_then(Value::as_str) != Some(did) {
            warn!(expected = %did, actual = ?document.get("id"), "DID document ID mismatch");
        }

        Ok(document)
    }
}

impl Default for DidResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheme to reach a domain: plain HTTP for local development hosts
pub fn scheme_for(domain: &str) -> &'static str {
    if domain.starts_with("localhost") || domain.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    }
}

/// Convert a did:web DID to its resolution URL
///
/// `did:web:example.com` → `https://example.com/.well-known/did.json`
/// `did:web:example.com:users:alice` → `https://example.com/users/alice/did.json`
pub fn did_web_to_url(did: &str) -> Result<String> {
    let without_prefix = did
        .strip_prefix("did:web:")
        .ok_or_else(|| BrainError::BadRequest("Missing did:web: prefix".to_string()))?;

    let parts: Vec<&str> = without_prefix.split(':').collect();
    if parts[0].is_empty() {
        return Err(BrainError::BadRequest("Empty domain in did:web".to_string()));
    }

    let domain = parts[0].replace("%3A", ":");

    let path = if parts.len() > 1 {
        format!("/{}/did.json", parts[1..].join("/"))
    } else {
        "/.well-known/did.json".to_string()
    };

    Ok(format!("{}://{domain}{path}", scheme_for(&domain)))
}

/// Encode an Ed25519 public key as a `did:key`
pub fn encode_did_key(public_key: &[u8; 32]) -> String {
    let mut bytes = ED25519_MULTICODEC.to_vec();
    bytes.extend_from_slice(public_key);
    format!("did:key:z{}", bs58::encode(bytes).into_string())
}

/// Extract the Ed25519 public key from a `did:key`
pub fn decode_did_key(did: &str) -> Result<[u8; 32]> {
    let key_part = did
        .strip_prefix("did:key:")
        .ok_or_else(|| BrainError::BadRequest("Missing did:key: prefix".to_string()))?;

    let encoded = key_part.strip_prefix('z').ok_or_else(|| {
        BrainError::BadRequest("did:key must use base58btc encoding (z prefix)".to_string())
    })?;

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| BrainError::BadRequest(format!("Invalid did:key encoding: {}", e)))?;

    if bytes.len() != 34 || bytes[..2] != ED25519_MULTICODEC {
        return Err(BrainError::BadRequest(
            "did:key is not an Ed25519 key".to_string(),
        ));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[2..]);
    Ok(key)
}

/// Build the document of an Ed25519 `did:key`
pub fn resolve_did_key(did: &str) -> Result<Value> {
    let public_key = decode_did_key(did)?;
    let fragment = did.trim_start_matches("did:key:");
    let key_id = format!("{}#{}", did, fragment);

    Ok(json!({
        "@context": [
            "https://www.w3.org/ns/did/v1",
            "https://w3id.org/security/suites/jws-2020/v1"
        ],
        "id": did,
        "verificationMethod": [{
            "id": key_id,
            "type": "JsonWebKey2020",
            "controller": did,
            "publicKeyJwk": {
                "kty": "OKP",
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode(public_key),
            }
        }],
        "authentication": [key_id],
        "assertionMethod": [key_id],
        "capabilityDelegation": [key_id],
        "capabilityInvocation": [key_id],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DID: &str = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";

    #[test]
    fn test_did_web_to_url() {
        assert_eq!(
            did_web_to_url("did:web:example.com").unwrap(),
            "https://example.com/.well-known/did.json"
        );
        assert_eq!(
            did_web_to_url("did:web:example.com:users:alice").unwrap(),
            "https://example.com/users/alice/did.json"
        );
        assert_eq!(
            did_web_to_url("did:web:localhost%3A3000:manager:m1").unwrap(),
            "http://localhost:3000/manager/m1/did.json"
        );
    }

    #[test]
    fn test_did_key_round_trip() {
        let key = decode_did_key(DID).unwrap();
        assert_eq!(encode_did_key(&key), DID);
    }

    #[test]
    fn test_rejects_non_ed25519_keys() {
        assert!(decode_did_key("did:key:abc").is_err());
        assert!(decode_did_key("did:web:example.com").is_err());
        assert!(decode_did_key("did:key:z1111").is_err());
    }

    #[tokio::test]
    async fn test_resolve_did_key_creates_document() {
        let resolver = DidResolver::new();
        let doc = resolver.resolve(DID).await.unwrap();

        assert_eq!(doc["id"], DID);
        let vm = &doc["verificationMethod"][0];
        assert_eq!(vm["publicKeyJwk"]["crv"], "Ed25519");
        assert_eq!(
            vm["id"],
            format!("{}#z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK", DID)
        );
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let resolver = DidResolver::new();
        assert!(matches!(
            resolver.resolve("did:ion:abc").await,
            Err(BrainError::BadRequest(_))
        ));
    }
}
