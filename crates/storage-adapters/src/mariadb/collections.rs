//! `CollectionRepo` over the `collections` and `collection_images` tables.

use async_trait::async_trait;
use domains::models::CollectionRecord;
use domains::ports::CollectionRepo;
use domains::{DomainError, Result};
use sqlx::mysql::MySqlRow;
use sqlx::Row;

use super::{db_err, MariaRepo};

fn map_collection(row: &MySqlRow) -> CollectionRecord {
    CollectionRecord {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        uploader_id: row.get("uploader_id"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CollectionRepo for MariaRepo {
    async fn collection_by_name(&self, name: &str) -> Result<CollectionRecord> {
        let row = sqlx::query(
            "SELECT id, name, description, uploader_id, created_at \
             FROM collections WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(DomainError::NotFound("collection"))?;
        Ok(map_collection(&row))
    }

    async fn create_collection(
        &self,
        name: &str,
        description: &str,
        uploader_id: u64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO collections (name, description, uploader_id) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(uploader_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.last_insert_id())
    }

    /// Members append after the current highest ordering; rows already in
    /// the collection are left where they are.
    async fn add_members(
        &self,
        collection_id: u64,
        image_ids: Vec<u64>,
        linker_id: u64,
    ) -> Result<()> {
        if image_ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(
            "SELECT MAX(ordering) AS top FROM collection_images WHERE collection_id = ?",
        )
        .bind(collection_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let mut ordering: u64 = row.get::<Option<u64>, _>("top").unwrap_or(0);

        for image_id in image_ids {
            ordering += 1;
            sqlx::query(
                "INSERT IGNORE INTO collection_images (collection_id, image_id, ordering, linker_id) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(collection_id)
            .bind(image_id)
            .bind(ordering)
            .bind(linker_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn collections_with_image(&self, image_id: u64) -> Result<Vec<CollectionRecord>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name, c.description, c.uploader_id, c.created_at \
             FROM collections c JOIN collection_images ci ON ci.collection_id = c.id \
             WHERE ci.image_id = ? ORDER BY c.name",
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(map_collection).collect())
    }
}
