//! # Domain layer
//!
//! Entity models, the permission bitmask, the parsed tag-query model and
//! the port traits every adapter implements. This crate has no I/O of its
//! own; adapters map their failures into [`DomainError`] at the boundary.

pub mod error;
pub mod models;
pub mod permissions;
pub mod ports;
pub mod query;

pub use error::{DomainError, Result};
