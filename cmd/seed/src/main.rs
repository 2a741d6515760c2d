//! # seed
//!
//! Bootstraps the admin account. There is no self-serve registration, so
//! a fresh deployment runs this once to get a usable login:
//!
//! ```text
//! DATABASE_URL=mysql://... SEED_ADMIN_NAME=admin SEED_ADMIN_PASSWORD=... cargo run -p seed
//! ```
//!
//! Running it again resets the admin's password and permissions, which
//! doubles as the recovery path for a locked-out admin.

use anyhow::Context;
use auth_adapters::password::hash_password;
use domains::permissions::Permissions;
use sqlx::mysql::MySqlPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let name = std::env::var("SEED_ADMIN_NAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD is not set")?;

    let hash = hash_password(&password).context("hashing the admin password")?;

    let pool = MySqlPool::connect(&url)
        .await
        .context("connecting to the database")?;
    sqlx::migrate!("../../crates/storage-adapters/migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    sqlx::query(
        "INSERT INTO users (name, password_hash, permissions, disabled) VALUES (?, ?, ?, FALSE) \
         ON DUPLICATE KEY UPDATE password_hash = VALUES(password_hash), \
         permissions = VALUES(permissions), disabled = FALSE",
    )
    .bind(&name)
    .bind(&hash)
    .bind(Permissions::ALL.bits())
    .execute(&pool)
    .await
    .context("writing the admin account")?;

    println!("admin account {name:?} is ready");
    Ok(())
}
