//! LearnCard Network brain
//!
//! HTTP service and library implementing the LearnCard Network credential
//! protocol on top of MongoDB and NATS.
//!
//! ## Components
//!
//! - **URI resolver**: `lc:network:` / `lc:cloud:` URIs to resources
//! - **Templates**: `{{variable}}` substitution in boost credentials
//! - **DID documents**: cached, lock-protected did:web documents
//! - **Credential transfer**: send / accept with claim side effects
//! - **Claim hooks**: role grants, admin grants and auto-connect on claim
//! - **Proofs**: issuing and verifying credentials with the network identity
//! - **Notifications**: outbox dispatching to NATS

pub mod auth;
pub mod boosts;
pub mod claim_hooks;
pub mod config;
pub mod credentials;
pub mod db;
pub mod did;
pub mod graph;
pub mod identity;
pub mod logging;
pub mod nats;
pub mod notifications;
pub mod profiles;
pub mod routes;
pub mod server;
pub mod storage;
pub mod template;
pub mod types;
pub mod uri;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{BrainError, Result};
