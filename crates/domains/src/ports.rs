//! # Port Traits
//!
//! Contracts between the service/web layers and the adapters. Any adapter
//! must implement these to be wired into the binary. All methods are
//! object-safe so the application state can hold `Arc<dyn …>` handles.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::models::{
    CollectionRecord, Credentials, ImageRecord, Neighbors, NewImage, SearchPage, SessionState,
    TagRecord, UserRecord,
};
use crate::query::QueryTag;

/// Account persistence: identity, permissions and the single-session
/// token pair.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn user_by_name(&self, name: &str) -> Result<UserRecord>;

    /// Password hash and disabled flag for the logon flow.
    async fn credentials(&self, name: &str) -> Result<Credentials>;

    /// Stored token/address pair plus the disabled flag, for validation.
    async fn session_state(&self, name: &str) -> Result<SessionState>;

    /// Overwrites any previous token/address pair for the account.
    async fn store_token(&self, name: &str, token: &str, ip: &str) -> Result<()>;

    /// Clears the stored pair. Succeeds even when none is set.
    async fn clear_token(&self, name: &str) -> Result<()>;
}

/// Image persistence: rows, per-user votes, search and navigation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ImageRepo: Send + Sync {
    async fn create_image(&self, image: NewImage) -> Result<u64>;

    async fn image(&self, id: u64) -> Result<ImageRecord>;

    async fn image_by_file_name(&self, file_name: &str) -> Result<ImageRecord>;

    async fn set_source(&self, id: u64, source: &str) -> Result<()>;

    async fn set_name(&self, id: u64, name: &str, description: &str) -> Result<()>;

    async fn set_rating(&self, id: u64, rating: &str) -> Result<()>;

    async fn set_perceptual_hash(&self, id: u64, hash: u64) -> Result<()>;

    /// Upserts one user's vote and recomputes the image aggregates in the
    /// same transaction.
    async fn set_vote(&self, user_id: u64, image_id: u64, score: i64) -> Result<()>;

    async fn user_vote(&self, user_id: u64, image_id: u64) -> Result<Option<i64>>;

    /// One page of matches, newest first, plus the total match count.
    async fn search(&self, query: Vec<QueryTag>, offset: u64, limit: u64) -> Result<SearchPage>;

    /// Closest matching rows on either side of `image_id` under the query.
    async fn neighbors(&self, query: Vec<QueryTag>, image_id: u64) -> Result<Neighbors>;
}

/// Tag persistence and attachment.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TagRepo: Send + Sync {
    async fn create_tag(&self, name: &str, description: &str, creator_id: u64) -> Result<u64>;

    /// Stored tags whose name matches any of the given names.
    async fn tags_by_names(&self, names: Vec<String>) -> Result<Vec<TagRecord>>;

    async fn image_tags(&self, image_id: u64) -> Result<Vec<TagRecord>>;

    async fn attach_tags(&self, image_id: u64, tag_ids: Vec<u64>, linker_id: u64) -> Result<()>;

    /// Fails with [`crate::DomainError::NotFound`] when the tag is not
    /// currently attached to the image.
    async fn detach_tag(&self, image_id: u64, tag_id: u64) -> Result<()>;
}

/// Collection persistence. Members keep the order they were appended in.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CollectionRepo: Send + Sync {
    async fn collection_by_name(&self, name: &str) -> Result<CollectionRecord>;

    async fn create_collection(&self, name: &str, description: &str, uploader_id: u64)
        -> Result<u64>;

    /// Appends members in the given order, skipping ones already present.
    async fn add_members(&self, collection_id: u64, image_ids: Vec<u64>, linker_id: u64)
        -> Result<()>;

    async fn collections_with_image(&self, image_id: u64) -> Result<Vec<CollectionRecord>>;
}

/// Append-only audit trail of privileged actions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn record(&self, user_id: u64, action: &str, details: &str) -> Result<()>;
}

/// Media file storage and the artifacts derived from stored files.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Whether a content-addressed name is already stored.
    async fn contains(&self, file_name: &str) -> Result<bool>;

    async fn store(&self, file_name: &str, data: Bytes) -> Result<()>;

    /// Removes a stored file, for cleanup when the row insert fails.
    async fn remove(&self, file_name: &str) -> Result<()>;

    /// Writes the 250px WebP thumbnail for a stored file.
    async fn create_thumbnail(&self, file_name: &str) -> Result<()>;

    /// 64-bit difference hash of a stored file; `None` for media the
    /// decoder cannot read (video, audio).
    async fn perceptual_hash(&self, file_name: &str) -> Result<Option<u64>>;
}
