//! Database schemas
//!
//! Graph nodes and edges are stored one collection per type, keyed by a
//! natural `_id`. Unique indexes enforce what a graph database would enforce
//! with uniqueness constraints.

mod boost;
mod credential;
mod did;
mod edges;
mod metadata;
mod profile;
mod resource;

pub use boost::{BoostDoc, ClaimHookDoc, RoleDoc, BOOST_COLLECTION, CLAIM_HOOK_COLLECTION, ROLE_COLLECTION};
pub use credential::{CredentialDoc, TransferDoc, CREDENTIAL_COLLECTION, TRANSFER_COLLECTION};
pub use did::{DidDocumentDoc, LockDoc, DID_DOCUMENT_COLLECTION, LOCK_COLLECTION};
pub use edges::{AutoConnectDoc, RoleGrantDoc, AUTO_CONNECT_COLLECTION, ROLE_GRANT_COLLECTION};
pub use metadata::Metadata;
pub use profile::{ProfileDoc, ProfileManagerDoc, PROFILE_COLLECTION, PROFILE_MANAGER_COLLECTION};
pub use resource::{ResourceDoc, RESOURCE_COLLECTION};
