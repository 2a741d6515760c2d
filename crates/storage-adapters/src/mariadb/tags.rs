//! `TagRepo` over the `tags` and `image_tags` tables.

use async_trait::async_trait;
use domains::models::TagRecord;
use domains::ports::TagRepo;
use domains::{DomainError, Result};
use sqlx::mysql::MySqlRow;
use sqlx::{QueryBuilder, Row};

use super::{db_err, MariaRepo};

fn map_tag(row: &MySqlRow) -> TagRecord {
    TagRecord {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        creator_id: row.get("creator_id"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TagRepo for MariaRepo {
    async fn create_tag(&self, name: &str, description: &str, creator_id: u64) -> Result<u64> {
        let result = sqlx::query("INSERT INTO tags (name, description, creator_id) VALUES (?, ?, ?)")
            .bind(name)
            .bind(description)
            .bind(creator_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.last_insert_id())
    }

    async fn tags_by_names(&self, names: Vec<String>) -> Result<Vec<TagRecord>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(
            "SELECT id, name, description, creator_id, created_at FROM tags WHERE name IN (",
        );
        let mut list = qb.separated(", ");
        for name in names {
            list.push_bind(name);
        }
        qb.push(")");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.iter().map(map_tag).collect())
    }

    async fn image_tags(&self, image_id: u64) -> Result<Vec<TagRecord>> {
        let rows = sqlx::query(
            "SELECT t.id, t.name, t.description, t.creator_id, t.created_at \
             FROM tags t JOIN image_tags it ON it.tag_id = t.id \
             WHERE it.image_id = ? ORDER BY t.name",
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(map_tag).collect())
    }

    async fn attach_tags(&self, image_id: u64, tag_ids: Vec<u64>, linker_id: u64) -> Result<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO image_tags (image_id, tag_id, linker_id) VALUES (?, ?, ?)")
                .bind(image_id)
                .bind(tag_id)
                .bind(linker_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn detach_tag(&self, image_id: u64, tag_id: u64) -> Result<()> {
        let result = sqlx::query("DELETE FROM image_tags WHERE image_id = ? AND tag_id = ?")
            .bind(image_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("image tag"));
        }
        Ok(())
    }
}
