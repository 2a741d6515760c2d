//! Upload ingestion.
//!
//! Files arrive as in-memory bodies from the multipart decoder. The tag
//! line and the target collection are checked once up front; each file is
//! then hashed, deduplicated, stored, rowed, thumbnailed and tagged. One
//! bad file never aborts the batch, but a collection the actor may not
//! touch rejects the whole request before any file is read.

use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use domains::models::{NewImage, UserRecord};
use domains::permissions::Permissions;
use domains::ports::{CollectionRepo, ImageRepo, MediaStore, TagRepo};
use domains::{DomainError, Result};

use crate::audit::{actions, AuditTrail};
use crate::tagging::TagWriter;
use crate::Policy;

/// Upload extensions accepted, lowercase and without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jfif", "bmp", "gif", "png", "svg", "mpg", "mov", "webm", "avi", "mp4", "mp3",
    "ogg", "wav", "webp", "tiff", "tif",
];

/// One file pulled out of the upload form.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub body: Bytes,
}

/// The non-file fields accompanying an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadFields {
    pub source: String,
    pub tags: String,
    pub collection_name: String,
}

/// What happened to each file of a batch.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    /// Fresh rows, in ingestion order: original file name and new id.
    pub uploaded: Vec<(String, u64)>,
    /// Files whose content was already stored, mapped to the existing id.
    pub duplicates: Vec<(String, u64)>,
    /// Files that could not be ingested, with the reason.
    pub rejected: Vec<(String, DomainError)>,
    /// Non-fatal messages about the batch (tag and collection trouble).
    pub notes: Vec<String>,
}

impl UploadOutcome {
    /// Where to land after the batch: the last fresh row, or failing
    /// that the first duplicate.
    pub fn landing_id(&self) -> Option<u64> {
        self.uploaded
            .last()
            .map(|&(_, id)| id)
            .or_else(|| self.duplicates.first().map(|&(_, id)| id))
    }
}

enum CollectionTarget {
    Existing(u64),
    Missing(String),
}

pub struct UploadService {
    images: Arc<dyn ImageRepo>,
    collections: Arc<dyn CollectionRepo>,
    media: Arc<dyn MediaStore>,
    tag_writer: TagWriter,
    audit: AuditTrail,
    policy: Policy,
}

impl UploadService {
    pub fn new(
        images: Arc<dyn ImageRepo>,
        tags: Arc<dyn TagRepo>,
        collections: Arc<dyn CollectionRepo>,
        media: Arc<dyn MediaStore>,
        audit: AuditTrail,
        policy: Policy,
    ) -> Self {
        Self {
            images,
            collections,
            media,
            tag_writer: TagWriter::new(tags, audit.clone(), policy),
            audit,
            policy,
        }
    }

    /// Ingests a batch of files. Requires [`Permissions::UPLOAD_IMAGE`];
    /// a named collection the actor may not create or extend fails the
    /// whole batch up front.
    pub async fn ingest(
        &self,
        actor: &UserRecord,
        files: Vec<UploadFile>,
        fields: &UploadFields,
    ) -> Result<UploadOutcome> {
        if !actor.permissions.has(Permissions::UPLOAD_IMAGE) {
            self.audit
                .record(
                    actor.id,
                    actions::IMAGE_UPLOAD,
                    &format!("{} denied: no upload permission", actor.name),
                )
                .await;
            return Err(DomainError::PermissionDenied(format!(
                "{} may not upload images",
                actor.name
            )));
        }
        if files.is_empty() {
            return Err(DomainError::Validation("no file arrived with the upload".into()));
        }
        let target = self
            .collection_preflight(actor, fields.collection_name.trim())
            .await?;

        // Uploaders always own the rows they are about to create.
        let tags = self.tag_writer.resolve(actor, &fields.tags, true).await?;

        let mut outcome = UploadOutcome::default();
        outcome.notes.extend(tags.notes.iter().cloned());

        for file in files {
            match self.ingest_one(actor, &file, &fields.source, &tags.ids).await {
                Ok(Ingested::Fresh(id)) => outcome.uploaded.push((file.name, id)),
                Ok(Ingested::Duplicate(id)) => outcome.duplicates.push((file.name, id)),
                Err(err) => {
                    warn!(file = %file.name, error = %err, "upload rejected");
                    outcome.rejected.push((file.name, err));
                }
            }
        }

        if let Some(target) = target {
            if let Err(err) = self.extend_collection(actor, target, &outcome.uploaded).await {
                warn!(error = %err, "collection update failed");
                outcome.notes.push(format!("collection not updated: {err}"));
            }
        }
        Ok(outcome)
    }

    /// Resolves the collection named on the form, checking permissions
    /// before any file work happens.
    async fn collection_preflight(
        &self,
        actor: &UserRecord,
        name: &str,
    ) -> Result<Option<CollectionTarget>> {
        if name.is_empty() {
            return Ok(None);
        }
        match self.collections.collection_by_name(name).await {
            Ok(collection) => {
                if !self
                    .policy
                    .allows(actor, Permissions::MODIFY_COLLECTIONS, collection.uploader_id)
                {
                    self.audit
                        .record(
                            actor.id,
                            actions::IMAGE_UPLOAD,
                            &format!("{} denied: may not extend collection {name}", actor.name),
                        )
                        .await;
                    return Err(DomainError::PermissionDenied(format!(
                        "{} may not add to collection {name}",
                        actor.name
                    )));
                }
                Ok(Some(CollectionTarget::Existing(collection.id)))
            }
            Err(DomainError::NotFound(_)) => {
                if !actor.permissions.has(Permissions::ADD_COLLECTIONS) {
                    self.audit
                        .record(
                            actor.id,
                            actions::IMAGE_UPLOAD,
                            &format!("{} denied: may not create collection {name}", actor.name),
                        )
                        .await;
                    return Err(DomainError::PermissionDenied(format!(
                        "{} may not create collection {name}",
                        actor.name
                    )));
                }
                Ok(Some(CollectionTarget::Missing(name.to_string())))
            }
            Err(err) => Err(err),
        }
    }

    async fn ingest_one(
        &self,
        actor: &UserRecord,
        file: &UploadFile,
        source: &str,
        tag_ids: &[u64],
    ) -> Result<Ingested> {
        let ext = extension_of(&file.name)?;
        if file.body.is_empty() {
            return Err(DomainError::Validation(format!("{} is empty", file.name)));
        }
        let content_name = format!("{}.{ext}", hex::encode(Sha256::digest(&file.body)));

        if self.media.contains(&content_name).await? {
            return match self.images.image_by_file_name(&content_name).await {
                Ok(existing) => Ok(Ingested::Duplicate(existing.id)),
                Err(DomainError::NotFound(_)) => Err(DomainError::Validation(format!(
                    "{} is already stored",
                    file.name
                ))),
                Err(err) => Err(err),
            };
        }

        self.media.store(&content_name, file.body.clone()).await?;
        let id = match self
            .images
            .create_image(NewImage {
                file_name: content_name.clone(),
                display_name: content_name.clone(),
                uploader_id: actor.id,
                source: source.to_string(),
            })
            .await
        {
            Ok(id) => id,
            Err(err) => {
                // The row is the record of truth; drop the orphaned file.
                if let Err(cleanup) = self.media.remove(&content_name).await {
                    warn!(file = %content_name, error = %cleanup, "orphan cleanup failed");
                }
                return Err(err);
            }
        };

        if let Err(err) = self.media.create_thumbnail(&content_name).await {
            debug!(file = %content_name, error = %err, "no thumbnail generated");
        }
        match self.media.perceptual_hash(&content_name).await {
            Ok(Some(hash)) => {
                if let Err(err) = self.images.set_perceptual_hash(id, hash).await {
                    warn!(image = id, error = %err, "perceptual hash not recorded");
                }
            }
            Ok(None) => {}
            Err(err) => debug!(file = %content_name, error = %err, "no perceptual hash"),
        }

        if let Err(err) = self.tag_writer.attach(actor, id, tag_ids).await {
            warn!(image = id, error = %err, "tagging a fresh upload failed");
        }
        self.audit
            .record(
                actor.id,
                actions::IMAGE_UPLOAD,
                &format!("{} uploaded as image {id}", file.name),
            )
            .await;
        Ok(Ingested::Fresh(id))
    }

    /// Creates the collection when needed and appends the batch's fresh
    /// rows, ordered by original file name.
    async fn extend_collection(
        &self,
        actor: &UserRecord,
        target: CollectionTarget,
        uploaded: &[(String, u64)],
    ) -> Result<()> {
        let collection_id = match target {
            CollectionTarget::Existing(id) => id,
            CollectionTarget::Missing(name) => {
                let id = self.collections.create_collection(&name, "", actor.id).await?;
                self.audit
                    .record(
                        actor.id,
                        actions::IMAGE_UPLOAD,
                        &format!("created collection {name}"),
                    )
                    .await;
                id
            }
        };

        let mut members: Vec<(String, u64)> = uploaded.to_vec();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        let ids: Vec<u64> = members.into_iter().map(|(_, id)| id).collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.collections
            .add_members(collection_id, ids.clone(), actor.id)
            .await?;
        self.audit
            .record(
                actor.id,
                actions::IMAGE_UPLOAD,
                &format!("{} images added to collection {collection_id}", ids.len()),
            )
            .await;
        Ok(())
    }
}

enum Ingested {
    Fresh(u64),
    Duplicate(u64),
}

fn extension_of(name: &str) -> Result<String> {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(DomainError::Validation(format!(
            "{name} is not a recognized file type"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::models::{CollectionRecord, ImageRecord};
    use domains::ports::{
        MockAuditRepo, MockCollectionRepo, MockImageRepo, MockMediaStore, MockTagRepo,
    };

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

    fn uploader() -> UserRecord {
        actor(Permissions::UPLOAD_IMAGE)
    }

    fn png(name: &str, body: &'static [u8]) -> UploadFile {
        UploadFile {
            name: name.into(),
            body: Bytes::from_static(body),
        }
    }

    fn existing_image(id: u64, file_name: &str) -> ImageRecord {
        ImageRecord {
            id,
            file_name: file_name.into(),
            display_name: file_name.into(),
            description: String::new(),
            uploader_id: 9,
            source: String::new(),
            rating: "unrated".into(),
            score_total: 0,
            score_voters: 0,
            score_average: 0.0,
            perceptual_hash: None,
            uploaded_at: Utc::now(),
        }
    }

    struct Mocks {
        images: MockImageRepo,
        tags: MockTagRepo,
        collections: MockCollectionRepo,
        media: MockMediaStore,
    }

    impl Default for Mocks {
        fn default() -> Self {
            Mocks {
                images: MockImageRepo::new(),
                tags: MockTagRepo::new(),
                collections: MockCollectionRepo::new(),
                media: MockMediaStore::new(),
            }
        }
    }

    impl Mocks {
        /// Happy-path media store: nothing stored yet, everything works.
        fn fresh_media(mut self) -> Self {
            self.media.expect_contains().returning(|_| Ok(false));
            self.media.expect_store().returning(|_, _| Ok(()));
            self.media.expect_create_thumbnail().returning(|_| Ok(()));
            self.media
                .expect_perceptual_hash()
                .returning(|_| Ok(Some(0xDEAD)));
            self
        }

        fn no_tags(mut self) -> Self {
            self.tags.expect_image_tags().returning(|_| Ok(vec![]));
            self
        }

        fn service(self, policy: Policy) -> UploadService {
            let mut audit = MockAuditRepo::new();
            audit.expect_record().returning(|_, _, _| Ok(()));
            UploadService::new(
                Arc::new(self.images),
                Arc::new(self.tags),
                Arc::new(self.collections),
                Arc::new(self.media),
                AuditTrail::new(Arc::new(audit)),
                policy,
            )
        }
    }

    fn fields() -> UploadFields {
        UploadFields::default()
    }

    #[tokio::test]
    async fn rejects_actors_without_the_upload_bit() {
        let result = Mocks::default()
            .service(Policy::default())
            .ingest(&actor(Permissions::NONE), vec![png("a.png", b"x")], &fields())
            .await;
        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn an_empty_batch_is_a_validation_error() {
        let result = Mocks::default()
            .service(Policy::default())
            .ingest(&uploader(), vec![], &fields())
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn stores_under_the_content_hash_with_the_original_extension() {
        let body: &[u8] = b"pixels";
        let expected = format!("{}.png", hex::encode(Sha256::digest(body)));
        let check = expected.clone();

        let mut mocks = Mocks::default().fresh_media().no_tags();
        mocks
            .images
            .expect_create_image()
            .withf(move |new| {
                new.file_name == check && new.display_name == check && new.uploader_id == 5
            })
            .times(1)
            .returning(|_| Ok(42));
        mocks
            .images
            .expect_set_perceptual_hash()
            .withf(|id, hash| *id == 42 && *hash == 0xDEAD)
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = mocks
            .service(Policy::default())
            .ingest(&uploader(), vec![png("Photo.PNG", body)], &fields())
            .await
            .unwrap();
        assert_eq!(outcome.uploaded, vec![("Photo.PNG".to_string(), 42)]);
        assert_eq!(outcome.landing_id(), Some(42));
    }

    #[tokio::test]
    async fn unrecognized_extensions_reject_the_file_not_the_batch() {
        let mut mocks = Mocks::default().fresh_media().no_tags();
        mocks.images.expect_create_image().returning(|_| Ok(7));
        mocks
            .images
            .expect_set_perceptual_hash()
            .returning(|_, _| Ok(()));

        let outcome = mocks
            .service(Policy::default())
            .ingest(
                &uploader(),
                vec![png("evil.exe", b"mz"), png("ok.png", b"px")],
                &fields(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].0, "evil.exe");
        assert_eq!(outcome.uploaded.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_content_maps_to_the_existing_row() {
        let body: &[u8] = b"same bytes";
        let stored_name = format!("{}.png", hex::encode(Sha256::digest(body)));
        let lookup_name = stored_name.clone();

        let mut mocks = Mocks::default();
        mocks.media.expect_contains().returning(|_| Ok(true));
        mocks
            .images
            .expect_image_by_file_name()
            .withf(move |name| name == lookup_name)
            .returning(move |name| Ok(existing_image(13, name)));

        let outcome = mocks
            .service(Policy::default())
            .ingest(&uploader(), vec![png("copy.png", body)], &fields())
            .await
            .unwrap();
        assert_eq!(outcome.duplicates, vec![("copy.png".to_string(), 13)]);
        assert!(outcome.uploaded.is_empty());
        assert_eq!(outcome.landing_id(), Some(13));
    }

    #[tokio::test]
    async fn a_fully_duplicate_batch_lands_on_the_first_match() {
        let mut mocks = Mocks::default();
        mocks.media.expect_contains().returning(|_| Ok(true));
        let mut id = 40;
        mocks.images.expect_image_by_file_name().returning(move |name| {
            id += 1;
            Ok(existing_image(id, name))
        });

        let outcome = mocks
            .service(Policy::default())
            .ingest(
                &uploader(),
                vec![png("a.png", b"one"), png("b.png", b"two")],
                &fields(),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome.duplicates,
            vec![("a.png".to_string(), 41), ("b.png".to_string(), 42)]
        );
        assert_eq!(outcome.landing_id(), Some(41));
    }

    #[tokio::test]
    async fn a_failed_row_insert_cleans_up_the_stored_file() {
        let mut mocks = Mocks::default();
        mocks.media.expect_contains().returning(|_| Ok(false));
        mocks.media.expect_store().returning(|_, _| Ok(()));
        mocks
            .images
            .expect_create_image()
            .returning(|_| Err(DomainError::Database("insert failed".into())));
        mocks.media.expect_remove().times(1).returning(|_| Ok(()));

        let outcome = mocks
            .service(Policy::default())
            .ingest(&uploader(), vec![png("a.png", b"x")], &fields())
            .await
            .unwrap();
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[tokio::test]
    async fn thumbnail_trouble_does_not_fail_the_upload() {
        let mut mocks = Mocks::default().no_tags();
        mocks.media.expect_contains().returning(|_| Ok(false));
        mocks.media.expect_store().returning(|_, _| Ok(()));
        mocks
            .media
            .expect_create_thumbnail()
            .returning(|_| Err(DomainError::Storage("undecodable".into())));
        mocks.media.expect_perceptual_hash().returning(|_| Ok(None));
        mocks.images.expect_create_image().returning(|_| Ok(8));

        let outcome = mocks
            .service(Policy::default())
            .ingest(&uploader(), vec![png("clip.webm", b"vid")], &fields())
            .await
            .unwrap();
        assert_eq!(outcome.uploaded.len(), 1);
    }

    #[tokio::test]
    async fn upload_tags_resolve_once_and_attach_to_each_fresh_row() {
        let mut mocks = Mocks::default().fresh_media();
        mocks
            .tags
            .expect_tags_by_names()
            .times(1)
            .returning(|_| {
                Ok(vec![domains::models::TagRecord {
                    id: 3,
                    name: "beach".into(),
                    description: String::new(),
                    creator_id: 1,
                    created_at: Utc::now(),
                }])
            });
        mocks.tags.expect_image_tags().returning(|_| Ok(vec![]));
        mocks
            .tags
            .expect_attach_tags()
            .withf(|_, ids, linker| ids == &[3] && *linker == 5)
            .times(2)
            .returning(|_, _, _| Ok(()));
        let mut id = 0;
        mocks.images.expect_create_image().returning(move |_| {
            id += 1;
            Ok(id)
        });
        mocks
            .images
            .expect_set_perceptual_hash()
            .returning(|_, _| Ok(()));

        let policy = Policy {
            users_control_own_objects: true,
        };
        let outcome = mocks
            .service(policy)
            .ingest(
                &uploader(),
                vec![png("a.png", b"one"), png("b.png", b"two")],
                &UploadFields {
                    tags: "beach".into(),
                    ..UploadFields::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.uploaded.len(), 2);
    }

    #[tokio::test]
    async fn a_new_collection_needs_the_create_bit_up_front() {
        let mut mocks = Mocks::default();
        mocks
            .collections
            .expect_collection_by_name()
            .returning(|_| Err(DomainError::NotFound("collection")));

        let result = mocks
            .service(Policy::default())
            .ingest(
                &uploader(),
                vec![png("a.png", b"x")],
                &UploadFields {
                    collection_name: "holiday".into(),
                    ..UploadFields::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn fresh_rows_join_the_collection_sorted_by_file_name() {
        let mut mocks = Mocks::default().fresh_media().no_tags();
        mocks
            .collections
            .expect_collection_by_name()
            .returning(|_| Err(DomainError::NotFound("collection")));
        mocks
            .collections
            .expect_create_collection()
            .withf(|name, _, uploader| name == "holiday" && *uploader == 5)
            .times(1)
            .returning(|_, _, _| Ok(70));
        // b.png ingests first but a.png sorts first.
        mocks
            .collections
            .expect_add_members()
            .withf(|collection, ids, linker| *collection == 70 && ids == &[2, 1] && *linker == 5)
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut id = 0;
        mocks.images.expect_create_image().returning(move |_| {
            id += 1;
            Ok(id)
        });
        mocks
            .images
            .expect_set_perceptual_hash()
            .returning(|_, _| Ok(()));

        let outcome = mocks
            .service(Policy::default())
            .ingest(
                &actor(Permissions::UPLOAD_IMAGE.with(Permissions::ADD_COLLECTIONS)),
                vec![png("b.png", b"two"), png("a.png", b"one")],
                &UploadFields {
                    collection_name: "holiday".into(),
                    ..UploadFields::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.notes.is_empty());
        assert_eq!(outcome.uploaded.len(), 2);
    }

    #[tokio::test]
    async fn extending_a_foreign_collection_needs_the_modify_bit() {
        let mut mocks = Mocks::default();
        mocks.collections.expect_collection_by_name().returning(|_| {
            Ok(CollectionRecord {
                id: 70,
                name: "holiday".into(),
                description: String::new(),
                uploader_id: 9,
                created_at: Utc::now(),
            })
        });

        let policy = Policy {
            users_control_own_objects: true,
        };
        let result = mocks
            .service(policy)
            .ingest(
                &uploader(),
                vec![png("a.png", b"x")],
                &UploadFields {
                    collection_name: "holiday".into(),
                    ..UploadFields::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }
}
