use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

mod accounts;
mod votes;

#[derive(Clone)]
pub struct SqlxClient {
    pool: SqlitePool,
}

impl SqlxClient {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn connect(path: &Path, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal)
            .page_size(8192)
            .pragma("cache_size", "204800")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open `{}`", path.display()))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to apply migrations")?;

        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
