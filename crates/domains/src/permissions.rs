//! # Permissions
//!
//! Account capabilities as a bitmask stored in a single unsigned column.
//! Operations that edit an object usually also accept the object's
//! uploader when the deployment enables the ownership override, but that
//! rule lives in the service layer; this type only answers "is the bit
//! set".

use serde::{Deserialize, Serialize};

/// Bitmask of account capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);

    /// Upload new images.
    pub const UPLOAD_IMAGE: Permissions = Permissions(1 << 0);
    /// Vote on images.
    pub const SCORE_IMAGE: Permissions = Permissions(1 << 1);
    /// Edit image source, display name and description.
    pub const EDIT_IMAGE_METADATA: Permissions = Permissions(1 << 2);
    /// Attach and detach tags, change ratings.
    pub const MODIFY_IMAGE_TAGS: Permissions = Permissions(1 << 3);
    /// Create new tags.
    pub const ADD_TAGS: Permissions = Permissions(1 << 4);
    /// Delete images.
    pub const REMOVE_IMAGE: Permissions = Permissions(1 << 5);
    /// Create collections.
    pub const ADD_COLLECTIONS: Permissions = Permissions(1 << 6);
    /// Add members to and edit existing collections.
    pub const MODIFY_COLLECTIONS: Permissions = Permissions(1 << 7);
    /// Administer accounts.
    pub const MANAGE_ACCOUNTS: Permissions = Permissions(1 << 8);

    /// Every defined bit; used when seeding the admin account.
    pub const ALL: Permissions = Permissions((1 << 9) - 1);

    pub const fn from_bits(bits: u64) -> Self {
        Permissions(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True when every bit of `needed` is set.
    pub const fn has(self, needed: Permissions) -> bool {
        self.0 & needed.0 == needed.0
    }

    pub const fn with(self, other: Permissions) -> Permissions {
        Permissions(self.0 | other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_checks_every_bit() {
        let p = Permissions::UPLOAD_IMAGE.with(Permissions::SCORE_IMAGE);
        assert!(p.has(Permissions::UPLOAD_IMAGE));
        assert!(p.has(Permissions::SCORE_IMAGE));
        assert!(!p.has(Permissions::ADD_TAGS));
        assert!(!p.has(Permissions::UPLOAD_IMAGE.with(Permissions::ADD_TAGS)));
    }

    #[test]
    fn all_covers_every_defined_bit() {
        assert!(Permissions::ALL.has(Permissions::MANAGE_ACCOUNTS));
        assert!(Permissions::ALL.has(Permissions::MODIFY_COLLECTIONS));
        assert!(!Permissions::NONE.has(Permissions::UPLOAD_IMAGE));
    }

    #[test]
    fn round_trips_through_bits() {
        let p = Permissions::MODIFY_IMAGE_TAGS.with(Permissions::ADD_TAGS);
        assert_eq!(Permissions::from_bits(p.bits()), p);
    }
}
