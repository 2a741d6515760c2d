//! `AccountRepo` over the `users` table.

use async_trait::async_trait;
use domains::models::{Credentials, SessionState, UserRecord};
use domains::permissions::Permissions;
use domains::ports::AccountRepo;
use domains::{DomainError, Result};
use sqlx::Row;

use super::{db_err, MariaRepo};

#[async_trait]
impl AccountRepo for MariaRepo {
    async fn user_by_name(&self, name: &str) -> Result<UserRecord> {
        let row = sqlx::query(
            "SELECT id, name, disabled, permissions, search_filter, created_at \
             FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(DomainError::NotFound("account"))?;

        Ok(UserRecord {
            id: row.get("id"),
            name: row.get("name"),
            disabled: row.get("disabled"),
            permissions: Permissions::from_bits(row.get("permissions")),
            search_filter: row.get("search_filter"),
            created_at: row.get("created_at"),
        })
    }

    async fn credentials(&self, name: &str) -> Result<Credentials> {
        let row = sqlx::query("SELECT id, password_hash, disabled FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(DomainError::NotFound("account"))?;

        Ok(Credentials {
            user_id: row.get("id"),
            password_hash: row.get("password_hash"),
            disabled: row.get("disabled"),
        })
    }

    async fn session_state(&self, name: &str) -> Result<SessionState> {
        let row = sqlx::query("SELECT disabled, token_id, token_ip FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(DomainError::NotFound("account"))?;

        Ok(SessionState {
            disabled: row.get("disabled"),
            token: row.get("token_id"),
            ip: row.get("token_ip"),
        })
    }

    async fn store_token(&self, name: &str, token: &str, ip: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET token_id = ?, token_ip = ? WHERE name = ?")
            .bind(token)
            .bind(ip)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        // A fresh token always changes the row, so zero means no such
        // account rather than an unchanged update.
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("account"));
        }
        Ok(())
    }

    async fn clear_token(&self, name: &str) -> Result<()> {
        sqlx::query("UPDATE users SET token_id = NULL, token_ip = NULL WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
