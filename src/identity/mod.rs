//! Server identity
//!
//! The brain signs, verifies, resolves DIDs and decrypts through a
//! [`DidCapability`]. The built-in implementation is an Ed25519 key derived
//! from the configured seed.

pub mod resolver;

pub use resolver::{decode_did_key, encode_did_key, DidResolver, DidResolverConfig};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::Value;
use std::sync::Arc;

use crate::types::{BrainError, Result};

/// Identity operations the protocol depends on
#[async_trait::async_trait]
pub trait DidCapability: Send + Sync {
    /// The identity's own `did:key`
    fn did(&self) -> String;

    /// Sign a message, returning a base64url signature
    fn sign(&self, message: &[u8]) -> String;

    /// Verify a base64url signature made by the key of `did`
    fn verify(&self, did: &str, message: &[u8], signature: &str) -> Result<bool>;

    /// Resolve any supported DID to its document
    async fn resolve_did(&self, did: &str) -> Result<Value>;

    /// Decrypt a JWE addressed to this identity
    async fn decrypt(&self, jwe: &Value) -> Result<Value>;
}

/// Ed25519 identity built from a 32-byte seed
pub struct Ed25519Identity {
    signing_key: SigningKey,
    did: String,
    resolver: Arc<DidResolver>,
}

impl Ed25519Identity {
    pub fn from_seed(seed: [u8; 32], resolver: Arc<DidResolver>) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let did = encode_did_key(signing_key.verifying_key().as_bytes());

        Self {
            signing_key,
            did,
            resolver,
        }
    }

    /// Parse a hex seed (64 hex characters)
    pub fn from_hex_seed(seed: &str, resolver: Arc<DidResolver>) -> Result<Self> {
        let bytes = hex::decode(seed.trim())
            .map_err(|e| BrainError::Config(format!("SEED is not valid hex: {}", e)))?;

        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| BrainError::Config("SEED must be 32 bytes (64 hex characters)".into()))?;

        Ok(Self::from_seed(seed, resolver))
    }
}

#[async_trait::async_trait]
impl DidCapability for Ed25519Identity {
    fn did(&self) -> String {
        self.did.clone()
    }

    fn sign(&self, message: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(self.signing_key.sign(message).to_bytes())
    }

    fn verify(&self, did: &str, message: &[u8], signature: &str) -> Result<bool> {
        let public_key = decode_did_key(did)?;
        let verifying_key = VerifyingKey::from_bytes(&public_key)
            .map_err(|e| BrainError::BadRequest(format!("Invalid public key: {}", e)))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| BrainError::BadRequest(format!("Invalid signature encoding: {}", e)))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| BrainError::BadRequest(format!("Invalid signature: {}", e)))?;

        Ok(verifying_key.verify(message, &signature).is_ok())
    }

    async fn resolve_did(&self, did: &str) -> Result<Value> {
        self.resolver.resolve(did).await
    }

    async fn decrypt(&self, _jwe: &Value) -> Result<Value> {
        Err(BrainError::Internal(
            "JWE decryption is not supported by the Ed25519 identity".into(),
        ))
    }
}

/// Whether a JSON value is a JWE (general or flattened serialization)
pub fn is_jwe(value: &Value) -> bool {
    value.get("protected").is_some() && value.get("ciphertext").is_some()
}
