//! Image-page commands: voting and metadata mutation.

use std::sync::Arc;

use domains::models::UserRecord;
use domains::permissions::Permissions;
use domains::ports::{ImageRepo, TagRepo};
use domains::{DomainError, Result};

use crate::audit::{actions, AuditTrail};
use crate::tagging::{ResolvedTags, TagWriter};
use crate::Policy;

/// Accepted vote bounds, inclusive.
pub const VOTE_MIN: i64 = -10;
pub const VOTE_MAX: i64 = 10;

/// What applying a tag line to an image did, for the page message.
#[derive(Debug, Default)]
pub struct TagApplication {
    pub attached: Vec<u64>,
    pub created: Vec<String>,
    pub notes: Vec<String>,
}

pub struct ImageCommands {
    images: Arc<dyn ImageRepo>,
    tags: Arc<dyn TagRepo>,
    tag_writer: TagWriter,
    audit: AuditTrail,
    policy: Policy,
}

impl ImageCommands {
    pub fn new(
        images: Arc<dyn ImageRepo>,
        tags: Arc<dyn TagRepo>,
        audit: AuditTrail,
        policy: Policy,
    ) -> Self {
        Self {
            images,
            tags: tags.clone(),
            tag_writer: TagWriter::new(tags, audit.clone(), policy),
            audit,
            policy,
        }
    }

    /// Records `actor`'s vote on an image. Scores outside
    /// `VOTE_MIN..=VOTE_MAX` are rejected before the store is touched.
    pub async fn vote(&self, actor: &UserRecord, image_id: u64, score: i64) -> Result<()> {
        if !(VOTE_MIN..=VOTE_MAX).contains(&score) {
            return Err(DomainError::Validation(format!(
                "vote must be between {VOTE_MIN} and {VOTE_MAX}, got {score}"
            )));
        }
        let image = self.images.image(image_id).await?;
        self.permit(actor, Permissions::SCORE_IMAGE, image.uploader_id, "score images")?;
        self.images.set_vote(actor.id, image.id, score).await?;
        self.audit
            .record(
                actor.id,
                actions::IMAGE_SCORE,
                &format!("image {image_id} scored {score}"),
            )
            .await;
        Ok(())
    }

    pub async fn set_source(&self, actor: &UserRecord, image_id: u64, source: &str) -> Result<()> {
        let image = self.images.image(image_id).await?;
        self.permit(actor, Permissions::EDIT_IMAGE_METADATA, image.uploader_id, "edit image sources")?;
        self.images.set_source(image_id, source).await?;
        self.audit
            .record(
                actor.id,
                actions::IMAGE_SOURCE,
                &format!("image {image_id} source set to {source:?}"),
            )
            .await;
        Ok(())
    }

    /// Renames an image and replaces its description in one step, the way
    /// the edit form submits them.
    pub async fn set_name(
        &self,
        actor: &UserRecord,
        image_id: u64,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let image = self.images.image(image_id).await?;
        self.permit(actor, Permissions::EDIT_IMAGE_METADATA, image.uploader_id, "rename images")?;
        self.images.set_name(image_id, name, description).await?;
        self.audit
            .record(
                actor.id,
                actions::IMAGE_NAME,
                &format!("image {image_id} renamed to {name:?}"),
            )
            .await;
        Ok(())
    }

    /// Ratings are free-form labels, stored lowercased.
    pub async fn set_rating(&self, actor: &UserRecord, image_id: u64, rating: &str) -> Result<()> {
        let rating = rating.trim().to_lowercase();
        if rating.is_empty() || rating.len() > 40 {
            return Err(DomainError::Validation(
                "rating must be 1 to 40 characters".into(),
            ));
        }
        let image = self.images.image(image_id).await?;
        self.permit(actor, Permissions::MODIFY_IMAGE_TAGS, image.uploader_id, "change ratings")?;
        self.images.set_rating(image_id, &rating).await?;
        self.audit
            .record(
                actor.id,
                actions::ADD_IMAGERATING,
                &format!("image {image_id} rated {rating}"),
            )
            .await;
        Ok(())
    }

    /// Applies a typed tag line to an image. Existing names attach,
    /// missing ones are created first when the actor may create tags, and
    /// names already on the image are left alone.
    pub async fn add_tags(
        &self,
        actor: &UserRecord,
        image_id: u64,
        line: &str,
    ) -> Result<TagApplication> {
        let image = self.images.image(image_id).await?;
        self.permit(actor, Permissions::MODIFY_IMAGE_TAGS, image.uploader_id, "tag images")?;

        let owns = actor.id == image.uploader_id;
        let ResolvedTags { ids, created, notes } =
            self.tag_writer.resolve(actor, line, owns).await?;
        let attached = self.tag_writer.attach(actor, image_id, &ids).await?;
        Ok(TagApplication { attached, created, notes })
    }

    pub async fn remove_tag(&self, actor: &UserRecord, image_id: u64, tag_id: u64) -> Result<()> {
        let image = self.images.image(image_id).await?;
        self.permit(actor, Permissions::MODIFY_IMAGE_TAGS, image.uploader_id, "untag images")?;
        self.tags.detach_tag(image_id, tag_id).await?;
        self.audit
            .record(
                actor.id,
                actions::REMOVE_IMAGETAG,
                &format!("image {image_id} lost tag {tag_id}"),
            )
            .await;
        Ok(())
    }

    fn permit(
        &self,
        actor: &UserRecord,
        needed: Permissions,
        owner_id: u64,
        action: &str,
    ) -> Result<()> {
        if self.policy.allows(actor, needed, owner_id) {
            return Ok(());
        }
        Err(DomainError::PermissionDenied(format!(
            "{} may not {action}",
            actor.name
        )))
    }
}
