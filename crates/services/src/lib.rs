//! # services
//!
//! The application logic of tagboard, written against the domain ports.
//! Each service owns the rules for one surface: session tokens, tag
//! queries, image-page commands, upload ingestion. Nothing here touches
//! sqlx, axum or the filesystem; adapters are reached through
//! `Arc<dyn …>` handles so every rule is testable against mocks.

pub mod audit;
pub mod images;
pub mod query;
pub mod session;
pub mod tagging;
pub mod upload;

use domains::models::UserRecord;
use domains::permissions::Permissions;

/// Deployment knobs that change what callers may do.
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// Uploaders may edit their own images and collections without
    /// holding the matching permission bit.
    pub users_control_own_objects: bool,
}

impl Policy {
    /// Permission bit, or ownership when the override is enabled.
    pub fn allows(&self, actor: &UserRecord, needed: Permissions, owner_id: u64) -> bool {
        actor.permissions.has(needed)
            || (self.users_control_own_objects && actor.id == owner_id)
    }
}
