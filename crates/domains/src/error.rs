//! # DomainError
//!
//! Centralized error type for the tagboard ports. Adapters translate their
//! library errors into these variants; the web layer decides how each one
//! is shown to the caller.

use thiserror::Error;

/// The primary error type for all port operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Row lookup found nothing (image, tag, collection, account).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input rejected before reaching any statement.
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller lacks the permission bit and any ownership override.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A cookie token did not survive the validation sequence.
    #[error("session rejected: {0}")]
    SessionRejected(&'static str),

    /// Relational store failure.
    #[error("database error: {0}")]
    Database(String),

    /// Media store failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// A specialized Result type for tagboard logic.
pub type Result<T> = std::result::Result<T, DomainError>;
