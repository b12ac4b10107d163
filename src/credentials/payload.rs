//! Credential bodies accepted for sending

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{BrainError, Result};

/// A single value or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// `issuer` is either a DID or an object carrying one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Issuer {
    Id(String),
    Object {
        id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

/// A verifiable credential without a proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedCredential {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    #[serde(rename = "type")]
    pub types: OneOrMany<String>,
    pub issuer: Issuer,
    pub credential_subject: OneOrMany<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A verifiable credential with one or more proofs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedCredential {
    pub proof: OneOrMany<Map<String, Value>>,
    #[serde(flatten)]
    pub credential: UnsignedCredential,
}

/// A JWE in general or flattened JSON serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwe {
    pub protected: String,
    pub ciphertext: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything `send` will store. Variants are tried in order, so a
/// credential with a `proof` is never taken for an unsigned one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialPayload {
    Encrypted(Jwe),
    Signed(SignedCredential),
    Unsigned(UnsignedCredential),
}

impl CredentialPayload {
    /// Validate a request body; anything else is `BadRequest`
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|_| {
            BrainError::BadRequest(
                "Credential must be an unsigned credential, a signed credential or a JWE".into(),
            )
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encrypted(_) => "jwe",
            Self::Signed(_) => "signed",
            Self::Unsigned(_) => "unsigned",
        }
    }

    pub fn into_value(self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| BrainError::Internal(format!("Failed to encode credential: {}", e)))
    }
}
