//! Shared types

pub mod error;

pub use error::{BrainError, Result};
