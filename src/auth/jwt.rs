//! JWT token handling
//!
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - Default expiry is 1 hour
//! - In production, JWT_SECRET should be a strong random value from environment

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{BrainError, Result};

const MIN_SECRET_LEN: usize = 32;

/// How much a token lets its holder do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    /// Read-only access to the caller's own data
    Partial,
    /// Everything the caller's profile may do
    Full,
}

/// Payload stored in a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The caller's did:key
    pub did: String,
    /// Space-separated scopes, `*` for all
    #[serde(default)]
    pub scope: String,
    pub auth_level: AuthLevel,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// Fail unless the token grants full access
    pub fn require_full(&self) -> Result<&Self> {
        if self.auth_level == AuthLevel::Full {
            Ok(self)
        } else {
            Err(BrainError::Unauthorized(
                "This operation requires full authentication".into(),
            ))
        }
    }
}

/// Input for creating a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub did: String,
    pub scope: String,
    pub auth_level: AuthLevel,
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(BrainError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(BrainError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Validator for dev mode
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds: 3600,
        }
    }

    pub fn generate_token(&self, input: TokenInput) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| BrainError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            did: input.did,
            scope: input.scope,
            auth_level: input.auth_level,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| BrainError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a token. Any failure is `Unauthorized`.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => Ok(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let message = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                Err(BrainError::Unauthorized(message.into()))
            }
        }
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> JwtValidator {
        JwtValidator::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            3600,
        )
        .unwrap()
    }

    fn input(level: AuthLevel) -> TokenInput {
        TokenInput {
            did: "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK".into(),
            scope: "*".into(),
            auth_level: level,
        }
    }

    #[test]
    fn test_generate_and_verify_token() {
        let validator = test_validator();

        let token = validator.generate_token(input(AuthLevel::Full)).unwrap();
        let claims = validator.verify_token(&token).unwrap();

        assert_eq!(claims.did, "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK");
        assert_eq!(claims.auth_level, AuthLevel::Full);
        assert!(claims.require_full().is_ok());
    }

    #[test]
    fn test_partial_tokens_cannot_mutate() {
        let validator = test_validator();
        let token = validator.generate_token(input(AuthLevel::Partial)).unwrap();
        let claims = validator.verify_token(&token).unwrap();

        assert!(matches!(claims.require_full(), Err(BrainError::Unauthorized(_))));
    }

    #[test]
    fn test_invalid_and_foreign_tokens() {
        let validator = test_validator();
        assert!(matches!(
            validator.verify_token("invalid-token"),
            Err(BrainError::Unauthorized(_))
        ));

        let other = JwtValidator::new(
            "different-secret-that-is-at-least-32-characters".into(),
            3600,
        )
        .unwrap();
        let token = other.generate_token(input(AuthLevel::Full)).unwrap();
        assert!(validator.verify_token(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_secret_validation() {
        assert!(JwtValidator::new("short".into(), 3600).is_err());
        assert!(JwtValidator::new("".into(), 3600).is_err());
        assert!(JwtValidator::new("this-secret-is-at-least-32-chars-long".into(), 3600).is_ok());
    }
}
