//! MariaDB implementation of the persistence ports.
//!
//! One pool-backed repo implements all five repository traits so the
//! binary can hand the same value to every port. Rows are mapped by hand;
//! `BIGINT UNSIGNED` columns travel as `u64` and `TIMESTAMP` columns as
//! `DateTime<Utc>`.

mod accounts;
mod audit;
mod collections;
mod images;
mod search;
mod tags;

use domains::{DomainError, Result};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::info;

#[derive(Clone)]
pub struct MariaRepo {
    pool: MySqlPool,
    /// Maximum difference-hash distance for `similar:` matches.
    similar_distance: u32,
}

impl MariaRepo {
    /// Connects, runs pending migrations, and returns the shared repo.
    pub async fn connect(url: &str, max_connections: u32, similar_distance: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| DomainError::Database(err.to_string()))?;
        info!(max_connections, "database ready");
        Ok(Self { pool, similar_distance })
    }
}

fn db_err(err: sqlx::Error) -> DomainError {
    DomainError::Database(err.to_string())
}
