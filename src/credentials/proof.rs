//! Credential proofs made and checked with a [`DidCapability`]
//!
//! The signature covers the canonical JSON of the credential (without its
//! `proof`) and of the proof options (without `proofValue`), joined by `.`.
//! Canonical JSON sorts object keys at every level.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::payload::{CredentialPayload, OneOrMany};
use crate::identity::DidCapability;
use crate::types::{BrainError, Result};

pub const PROOF_TYPE: &str = "JsonEd25519Signature";

/// Outcome of verifying a credential
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationResult {
    pub checks: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && !self.checks.is_empty()
    }
}

fn canonical(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let members: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical(&map[k])))
                .collect();
            format!("{{{}}}", members.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

fn signing_input(credential: &Map<String, Value>, options: &Map<String, Value>) -> Vec<u8> {
    let mut body = credential.clone();
    body.remove("proof");
    let mut options = options.clone();
    options.remove("proofValue");

    format!(
        "{}.{}",
        canonical(&Value::Object(body)),
        canonical(&Value::Object(options))
    )
    .into_bytes()
}

/// Sign an unsigned credential as `identity`, which becomes its issuer
pub fn issue(identity: &dyn DidCapability, credential: Value) -> Result<Value> {
    match CredentialPayload::from_value(credential.clone())? {
        CredentialPayload::Unsigned(_) => {}
        CredentialPayload::Signed(_) => {
            return Err(BrainError::BadRequest("Credential is already signed".into()))
        }
        CredentialPayload::Encrypted(_) => {
            return Err(BrainError::BadRequest("Cannot sign an encrypted credential".into()))
        }
    }

    let Value::Object(mut body) = credential else {
        return Err(BrainError::BadRequest("Credential must be an object".into()));
    };

    let did = identity.did();
    let now = Utc::now().to_rfc3339();
    body.insert("issuer".into(), Value::String(did.clone()));
    body.entry("issuanceDate").or_insert_with(|| Value::String(now.clone()));

    let fragment = did.trim_start_matches("did:key:");
    let mut options = match json!({
        "type": PROOF_TYPE,
        "created": now,
        "proofPurpose": "assertionMethod",
        "verificationMethod": format!("{}#{}", did, fragment),
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let signature = identity.sign(&signing_input(&body, &options));
    options.insert("proofValue".into(), Value::String(signature));
    body.insert("proof".into(), Value::Object(options));

    Ok(Value::Object(body))
}

/// Check every supported proof on a credential, and its expiry
pub fn verify(identity: &dyn DidCapability, credential: &Value) -> VerificationResult {
    let mut result = VerificationResult::default();

    let proofs = match CredentialPayload::from_value(credential.clone()) {
        Ok(CredentialPayload::Signed(signed)) => match signed.proof {
            OneOrMany::One(proof) => vec![proof],
            OneOrMany::Many(proofs) => proofs,
        },
        Ok(CredentialPayload::Unsigned(_)) => {
            result.errors.push("Credential has no proof".into());
            return result;
        }
        Ok(CredentialPayload::Encrypted(_)) => {
            result.errors.push("Cannot verify an encrypted credential".into());
            return result;
        }
        Err(e) => {
            result.errors.push(e.to_string());
            return result;
        }
    };

    let Some(body) = credential.as_object() else {
        return result;
    };

    let mut verified = 0;
    for proof in &proofs {
        let proof_type = proof.get("type").and_then(Value::as_str).unwrap_or("");
        if proof_type != PROOF_TYPE {
            result
                .warnings
                .push(format!("Unsupported proof type: {}", proof_type));
            continue;
        }

        let method = proof
            .get("verificationMethod")
            .and_then(Value::as_str)
            .unwrap_or("");
        let did = method.split('#').next().unwrap_or("");
        let Some(signature) = proof.get("proofValue").and_then(Value::as_str) else {
            result.errors.push("Proof has no proofValue".into());
            continue;
        };

        match identity.verify(did, &signing_input(body, proof), signature) {
            Ok(true) => verified += 1,
            Ok(false) => result.errors.push("Signature does not match".into()),
            Err(e) => result.errors.push(e.to_string()),
        }
    }

    if verified == 0 && result.errors.is_empty() {
        result.errors.push("No supported proof".into());
    } else if verified > 0 {
        result.checks.push("proof".into());
    }

    if let Some(raw) = body.get("expirationDate").and_then(Value::as_str) {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(expires) if expires.with_timezone(&Utc) < Utc::now() => {
                result.errors.push("Credential has expired".into())
            }
            Ok(_) => result.checks.push("expiration".into()),
            Err(_) => result
                .warnings
                .push(format!("Unreadable expirationDate: {}", raw)),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DidResolver, Ed25519Identity};
    use std::sync::Arc;

    fn identity(seed: u8) -> Ed25519Identity {
        Ed25519Identity::from_seed([seed; 32], Arc::new(DidResolver::new()))
    }

    fn unsigned() -> Value {
        json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential"],
            "issuer": "did:key:placeholder",
            "credentialSubject": { "id": "did:key:z6Mksubject", "score": 95 },
        })
    }

    #[test]
    fn test_canonical_sorts_keys() {
        assert_eq!(
            canonical(&json!({ "b": [ { "d": 1, "c": 2 } ], "a": "x" })),
            r#"{"a":"x","b":[{"c":2,"d":1}]}"#
        );
    }

    #[test]
    fn test_issued_credentials_verify() {
        let network = identity(3);
        let signed = issue(&network, unsigned()).unwrap();
        assert_eq!(signed["issuer"], network.did());
        assert_eq!(signed["proof"]["type"], PROOF_TYPE);

        // Any identity can check it; the key comes from the verification method
        let result = verify(&identity(4), &signed);
        assert!(result.is_valid(), "{:?}", result);
        assert_eq!(result.checks, vec!["proof".to_string()]);
    }

    #[test]
    fn test_tampering_is_detected() {
        let network = identity(3);
        let mut signed = issue(&network, unsigned()).unwrap();
        signed["credentialSubject"]["score"] = json!(100);

        let result = verify(&network, &signed);
        assert!(!result.is_valid());
        assert_eq!(result.errors, vec!["Signature does not match".to_string()]);
    }

    #[test]
    fn test_unsigned_and_expired() {
        let network = identity(3);
        assert!(!verify(&network, &unsigned()).is_valid());

        let mut expiring = unsigned();
        expiring["expirationDate"] = json!("2001-01-01T00:00:00Z");
        let signed = issue(&network, expiring).unwrap();

        let result = verify(&network, &signed);
        assert!(result.checks.contains(&"proof".to_string()));
        assert_eq!(result.errors, vec!["Credential has expired".to_string()]);
    }

    #[test]
    fn test_issue_rejects_signed_input() {
        let network = identity(3);
        let signed = issue(&network, unsigned()).unwrap();
        assert!(matches!(issue(&network, signed), Err(BrainError::BadRequest(_))));
    }
}
