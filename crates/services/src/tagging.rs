//! Tag resolution and attachment, shared by the upload pipeline and the
//! image-page tag command.
//!
//! Resolution turns a typed tag line into usable tag ids once, applying
//! the permission rules per tag: using an existing tag needs the modify
//! bit (or ownership of the target), creating a missing one needs the
//! create bit. Attachment then links ids to an image, skipping ones
//! already present.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domains::models::UserRecord;
use domains::permissions::Permissions;
use domains::ports::TagRepo;
use domains::Result;

use crate::audit::{actions, AuditTrail};
use crate::Policy;

/// Outcome of resolving a tag line.
#[derive(Debug, Default)]
pub struct ResolvedTags {
    /// Ids cleared for attachment, in the order they were typed.
    pub ids: Vec<u64>,
    /// Names that had to be created first.
    pub created: Vec<String>,
    /// User-facing reasons for tags that could not be used.
    pub notes: Vec<String>,
}

pub struct TagWriter {
    tags: Arc<dyn TagRepo>,
    audit: AuditTrail,
    policy: Policy,
}

impl TagWriter {
    pub fn new(tags: Arc<dyn TagRepo>, audit: AuditTrail, policy: Policy) -> Self {
        Self { tags, audit, policy }
    }

    /// Resolves a whitespace-separated tag line to ids. `owns_target`
    /// feeds the ownership override for *using* existing tags; creation
    /// always requires [`Permissions::ADD_TAGS`]. Meta-style `key:value`
    /// names are never stored and are dropped here.
    pub async fn resolve(
        &self,
        actor: &UserRecord,
        line: &str,
        owns_target: bool,
    ) -> Result<ResolvedTags> {
        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for raw in line.split_whitespace() {
            let name = raw.trim_start_matches('-').to_lowercase();
            if name.is_empty() || name.contains(':') {
                continue;
            }
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }

        let mut resolved = ResolvedTags::default();
        if names.is_empty() {
            return Ok(resolved);
        }

        let stored: HashMap<String, u64> = self
            .tags
            .tags_by_names(names.clone())
            .await?
            .into_iter()
            .map(|tag| (tag.name, tag.id))
            .collect();

        let may_use = actor.permissions.has(Permissions::MODIFY_IMAGE_TAGS)
            || (self.policy.users_control_own_objects && owns_target);

        for name in names {
            match stored.get(&name) {
                Some(&id) => {
                    if may_use {
                        resolved.ids.push(id);
                    } else {
                        resolved
                            .notes
                            .push(format!("no permission to tag images with {name}"));
                    }
                }
                None => {
                    if !actor.permissions.has(Permissions::ADD_TAGS) {
                        resolved
                            .notes
                            .push(format!("no permission to create tag {name}"));
                        continue;
                    }
                    let id = self.tags.create_tag(&name, "", actor.id).await?;
                    self.audit
                        .record(actor.id, actions::CREATE_TAG, &format!("created tag {name}"))
                        .await;
                    resolved.created.push(name);
                    resolved.ids.push(id);
                }
            }
        }
        Ok(resolved)
    }

    /// Attaches resolved ids to an image, skipping ids already on it.
    /// Returns the ids that were newly attached.
    pub async fn attach(
        &self,
        actor: &UserRecord,
        image_id: u64,
        ids: &[u64],
    ) -> Result<Vec<u64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let present: HashSet<u64> = self
            .tags
            .image_tags(image_id)
            .await?
            .into_iter()
            .map(|tag| tag.id)
            .collect();
        let fresh: Vec<u64> = ids
            .iter()
            .copied()
            .filter(|id| !present.contains(id))
            .collect();
        if fresh.is_empty() {
            return Ok(fresh);
        }

        self.tags.attach_tags(image_id, fresh.clone(), actor.id).await?;
        let listed = fresh
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.audit
            .record(
                actor.id,
                actions::ADD_IMAGETAG,
                &format!("image {image_id} tagged with {listed}"),
            )
            .await;
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::models::TagRecord;
    use domains::ports::{MockAuditRepo, MockTagRepo};

    fn actor(permissions: Permissions) -> UserRecord {
        UserRecord {
            id: 5,
            name: "alice".into(),
            disabled: false,
            permissions,
            search_filter: String::new(),
            created_at: Utc::now(),
        }
    }

    fn stored(id: u64, name: &str) -> TagRecord {
        TagRecord {
            id,
            name: name.into(),
            description: String::new(),
            creator_id: 1,
            created_at: Utc::now(),
        }
    }

    fn writer(tags: MockTagRepo, policy: Policy) -> TagWriter {
        let mut audit = MockAuditRepo::new();
        audit.expect_record().returning(|_, _, _| Ok(()));
        TagWriter::new(Arc::new(tags), AuditTrail::new(Arc::new(audit)), policy)
    }

    #[tokio::test]
    async fn resolves_existing_tags_with_the_modify_bit() {
        let mut tags = MockTagRepo::new();
        tags.expect_tags_by_names()
            .returning(|_| Ok(vec![stored(3, "beach"), stored(9, "sunset")]));

        let resolved = writer(tags, Policy::default())
            .resolve(&actor(Permissions::MODIFY_IMAGE_TAGS), "Beach sunset", false)
            .await
            .unwrap();
        assert_eq!(resolved.ids, vec![3, 9]);
        assert!(resolved.notes.is_empty());
    }

    #[tokio::test]
    async fn ownership_substitutes_for_the_modify_bit() {
        let mut tags = MockTagRepo::new();
        tags.expect_tags_by_names()
            .returning(|_| Ok(vec![stored(3, "beach")]));
        let policy = Policy {
            users_control_own_objects: true,
        };

        let own = writer(tags, policy)
            .resolve(&actor(Permissions::NONE), "beach", true)
            .await
            .unwrap();
        assert_eq!(own.ids, vec![3]);

        let mut tags = MockTagRepo::new();
        tags.expect_tags_by_names()
            .returning(|_| Ok(vec![stored(3, "beach")]));
        let foreign = writer(tags, policy)
            .resolve(&actor(Permissions::NONE), "beach", false)
            .await
            .unwrap();
        assert!(foreign.ids.is_empty());
        assert_eq!(foreign.notes.len(), 1);
    }

    #[tokio::test]
    async fn creates_missing_tags_only_with_the_create_bit() {
        let mut tags = MockTagRepo::new();
        tags.expect_tags_by_names().returning(|_| Ok(vec![]));
        tags.expect_create_tag()
            .withf(|name, _, creator| name == "newtag" && *creator == 5)
            .times(1)
            .returning(|_, _, _| Ok(77));

        let can = writer(tags, Policy::default())
            .resolve(
                &actor(Permissions::MODIFY_IMAGE_TAGS.with(Permissions::ADD_TAGS)),
                "newtag",
                false,
            )
            .await
            .unwrap();
        assert_eq!(can.ids, vec![77]);
        assert_eq!(can.created, vec!["newtag".to_string()]);

        let mut tags = MockTagRepo::new();
        tags.expect_tags_by_names().returning(|_| Ok(vec![]));
        let cannot = writer(tags, Policy::default())
            .resolve(&actor(Permissions::MODIFY_IMAGE_TAGS), "newtag", false)
            .await
            .unwrap();
        assert!(cannot.ids.is_empty());
        assert_eq!(cannot.notes.len(), 1);
    }

    #[tokio::test]
    async fn meta_style_names_are_dropped_before_any_lookup() {
        let resolved = writer(MockTagRepo::new(), Policy::default())
            .resolve(&actor(Permissions::MODIFY_IMAGE_TAGS), "rating:safe", false)
            .await
            .unwrap();
        assert!(resolved.ids.is_empty());
        assert!(resolved.notes.is_empty());
    }

    #[tokio::test]
    async fn attach_skips_tags_already_on_the_image() {
        let mut tags = MockTagRepo::new();
        tags.expect_image_tags()
            .returning(|_| Ok(vec![stored(3, "beach")]));
        tags.expect_attach_tags()
            .withf(|image, ids, linker| *image == 12 && ids == &[9] && *linker == 5)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let fresh = writer(tags, Policy::default())
            .attach(&actor(Permissions::MODIFY_IMAGE_TAGS), 12, &[3, 9])
            .await
            .unwrap();
        assert_eq!(fresh, vec![9]);
    }

    #[tokio::test]
    async fn attach_with_nothing_new_touches_nothing() {
        let mut tags = MockTagRepo::new();
        tags.expect_image_tags()
            .returning(|_| Ok(vec![stored(3, "beach")]));

        let fresh = writer(tags, Policy::default())
            .attach(&actor(Permissions::MODIFY_IMAGE_TAGS), 12, &[3])
            .await
            .unwrap();
        assert!(fresh.is_empty());
    }
}
