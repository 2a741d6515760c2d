//! # Domain Models
//!
//! These structs represent the core entities of tagboard. Everything is
//! identified by the relational store's `u64` auto-increment ids; the
//! structs carry no ORM derives and are mapped by hand in the adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permissions::Permissions;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub disabled: bool,
    pub permissions: Permissions,
    /// Tag query appended to every search this user runs; empty when unset.
    pub search_filter: String,
    pub created_at: DateTime<Utc>,
}

/// Stored single-session state for one account, read during token
/// validation. Token and address are set and cleared together.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub disabled: bool,
    /// Textual UUID of the active token, if any.
    pub token: Option<String>,
    /// Address the active token was issued to.
    pub ip: Option<String>,
}

/// Password credentials for the logon flow.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: u64,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub disabled: bool,
}

/// A stored media row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    /// Content-hash-derived file name: hex digest plus original extension.
    pub file_name: String,
    /// Starts out equal to `file_name`; editable afterwards.
    pub display_name: String,
    pub description: String,
    pub uploader_id: u64,
    pub source: String,
    /// Lowercased rating label, `unrated` until set.
    pub rating: String,
    pub score_total: i64,
    pub score_voters: i64,
    pub score_average: f64,
    /// 64-bit difference hash, filled in by a background task after upload.
    pub perceptual_hash: Option<u64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Row subset used by browse grids and neighbor lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: u64,
    pub file_name: String,
    pub display_name: String,
    pub rating: String,
}

/// Fields for a freshly ingested image row.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub file_name: String,
    pub display_name: String,
    pub uploader_id: u64,
    pub source: String,
}

/// An assignable label. Meta tags are never stored here; they exist only
/// inside parsed queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub creator_id: u64,
    pub created_at: DateTime<Utc>,
}

/// A named, ordered grouping of images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub uploader_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Navigation within a saved query relative to one image. Browse pages run
/// newest-first, so `previous` is the closest *higher* matching id and
/// `next` the closest lower one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

/// One page of search results plus the total match count.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<ImageSummary>,
    pub total: u64,
}
