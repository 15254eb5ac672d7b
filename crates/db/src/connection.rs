//! SQLite pool construction for the metadata store.
//!
//! WAL keeps concurrent conversation turns from blocking each other on
//! reads; the busy timeout covers the short write bursts a turn produces.

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

pub type DbPool = sqlx::SqlitePool;

const BUSY_TIMEOUT_MS: u32 = 5000;

/// Connects with the defaults the server uses when no tuning is configured.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    info!(event_name = "db.pool_connected", max_connections = max_connections.max(1));
    Ok(pool)
}
