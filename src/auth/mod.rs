//! Authentication for brain requests
//!
//! Callers present an HS256 bearer token naming their DID. Partial tokens
//! may read; anything that mutates a profile or moves a credential needs a
//! full token.

pub mod jwt;

pub use jwt::{extract_token_from_header, AuthLevel, Claims, JwtValidator, TokenInput};
