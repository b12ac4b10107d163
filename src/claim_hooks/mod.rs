//! Claim hooks
//!
//! A claim hook is a rule attached to a boost: when a profile claims
//! (accepts) an instance of the boost, the hook mutates the role or
//! connection graph of a target boost. [`ClaimHookEngine::process`] runs the
//! hooks; the management operations create, list and delete them.

mod engine;
mod management;

pub use engine::ClaimHookEngine;
pub use management::NewClaimHook;
