//! `AuditRepo` over the append-only `audit_log` table.

use async_trait::async_trait;
use domains::ports::AuditRepo;
use domains::Result;

use super::{db_err, MariaRepo};

#[async_trait]
impl AuditRepo for MariaRepo {
    async fn record(&self, user_id: u64, action: &str, details: &str) -> Result<()> {
        sqlx::query("INSERT INTO audit_log (user_id, action, details) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(action)
            .bind(details)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
