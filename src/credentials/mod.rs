//! Credential transfer
//!
//! Each (credential, recipient) pair moves from sent to accepted exactly
//! once. Accepting a boost instance fires the boost's claim hooks.

mod payload;
pub mod proof;
mod transfer;

pub use payload::{CredentialPayload, Issuer, Jwe, OneOrMany, SignedCredential, UnsignedCredential};
pub use proof::VerificationResult;
pub use transfer::{AcceptOptions, CredentialEngine, SentCredentialInfo};
