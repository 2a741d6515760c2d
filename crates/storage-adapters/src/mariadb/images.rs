//! `ImageRepo` over the `images` and `image_votes` tables.

use async_trait::async_trait;
use domains::models::{ImageRecord, ImageSummary, Neighbors, NewImage, SearchPage};
use domains::ports::ImageRepo;
use domains::query::QueryTag;
use domains::{DomainError, Result};
use sqlx::mysql::MySqlRow;
use sqlx::{QueryBuilder, Row};

use super::search::push_query_filters;
use super::{db_err, MariaRepo};

const IMAGE_COLUMNS: &str = "id, file_name, display_name, description, uploader_id, source, \
     rating, score_total, score_voters, score_average, perceptual_hash, uploaded_at";

fn map_image(row: &MySqlRow) -> ImageRecord {
    ImageRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        display_name: row.get("display_name"),
        description: row.get("description"),
        uploader_id: row.get("uploader_id"),
        source: row.get("source"),
        rating: row.get("rating"),
        score_total: row.get("score_total"),
        score_voters: row.get("score_voters"),
        score_average: row.get("score_average"),
        perceptual_hash: row.get("perceptual_hash"),
        uploaded_at: row.get("uploaded_at"),
    }
}

#[async_trait]
impl ImageRepo for MariaRepo {
    async fn create_image(&self, image: NewImage) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO images (file_name, display_name, description, uploader_id, source) \
             VALUES (?, ?, '', ?, ?)",
        )
        .bind(&image.file_name)
        .bind(&image.display_name)
        .bind(image.uploader_id)
        .bind(&image.source)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.last_insert_id())
    }

    async fn image(&self, id: u64) -> Result<ImageRecord> {
        let row = sqlx::query(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(DomainError::NotFound("image"))?;
        Ok(map_image(&row))
    }

    async fn image_by_file_name(&self, file_name: &str) -> Result<ImageRecord> {
        let row = sqlx::query(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE file_name = ?"
        ))
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(DomainError::NotFound("image"))?;
        Ok(map_image(&row))
    }

    async fn set_source(&self, id: u64, source: &str) -> Result<()> {
        sqlx::query("UPDATE images SET source = ? WHERE id = ?")
            .bind(source)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_name(&self, id: u64, name: &str, description: &str) -> Result<()> {
        sqlx::query("UPDATE images SET display_name = ?, description = ? WHERE id = ?")
            .bind(name)
            .bind(description)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_rating(&self, id: u64, rating: &str) -> Result<()> {
        sqlx::query("UPDATE images SET rating = ? WHERE id = ?")
            .bind(rating)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_perceptual_hash(&self, id: u64, hash: u64) -> Result<()> {
        sqlx::query("UPDATE images SET perceptual_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// The vote row and the image aggregates move together or not at all.
    async fn set_vote(&self, user_id: u64, image_id: u64, score: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO image_votes (image_id, user_id, score) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE score = VALUES(score)",
        )
        .bind(image_id)
        .bind(user_id)
        .bind(score)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "UPDATE images i SET \
               i.score_total = (SELECT COALESCE(SUM(v.score), 0) FROM image_votes v WHERE v.image_id = i.id), \
               i.score_voters = (SELECT COUNT(*) FROM image_votes v WHERE v.image_id = i.id), \
               i.score_average = (SELECT COALESCE(AVG(v.score), 0) FROM image_votes v WHERE v.image_id = i.id) \
             WHERE i.id = ?",
        )
        .bind(image_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn user_vote(&self, user_id: u64, image_id: u64) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT score FROM image_votes WHERE image_id = ? AND user_id = ?")
            .bind(image_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|row| row.get("score")))
    }

    async fn search(&self, query: Vec<QueryTag>, offset: u64, limit: u64) -> Result<SearchPage> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) AS total FROM images i");
        push_query_filters(&mut count, &query, self.similar_distance);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("total");

        let mut page = QueryBuilder::new(
            "SELECT i.id, i.file_name, i.display_name, i.rating FROM images i",
        );
        push_query_filters(&mut page, &query, self.similar_distance);
        page.push(" ORDER BY i.id DESC LIMIT ");
        page.push_bind(limit);
        page.push(" OFFSET ");
        page.push_bind(offset);

        let items = page
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(|row| ImageSummary {
                id: row.get("id"),
                file_name: row.get("file_name"),
                display_name: row.get("display_name"),
                rating: row.get("rating"),
            })
            .collect();

        Ok(SearchPage {
            items,
            total: total as u64,
        })
    }

    /// Newest-first ordering makes "previous" the closest higher id under
    /// the same filter and "next" the closest lower one.
    async fn neighbors(&self, query: Vec<QueryTag>, image_id: u64) -> Result<Neighbors> {
        let mut prev = QueryBuilder::new("SELECT MIN(i.id) AS id FROM images i");
        push_query_filters(&mut prev, &query, self.similar_distance);
        prev.push(" AND i.id > ");
        prev.push_bind(image_id);
        let previous: Option<u64> = prev
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("id");

        let mut next = QueryBuilder::new("SELECT MAX(i.id) AS id FROM images i");
        push_query_filters(&mut next, &query, self.similar_distance);
        next.push(" AND i.id < ");
        next.push_bind(image_id);
        let next: Option<u64> = next
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("id");

        Ok(Neighbors { previous, next })
    }
}
