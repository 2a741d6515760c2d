//! # auth-adapters
//!
//! Credential hashing and the session cookie codec. Session issuance and
//! validation themselves live in the services layer; this crate only turns
//! passwords into Argon2 hashes and cookies into name/token pairs.

pub mod cookies;
pub mod password;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
}
