//! MongoDB persistence
//!
//! Typed collection wrapper plus one schema per collection. The graph and
//! the shared DID cache/lock are built on top of this layer.

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
