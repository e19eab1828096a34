use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the collection tables. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // One row per collection, pinning the distance metric and dimensionality
    // chosen at creation time.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_meta (
            name TEXT PRIMARY KEY,
            distance TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-chunk records: embedding vector plus flattened scalar metadata.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            text TEXT NOT NULL,
            source_file TEXT NOT NULL,
            filename TEXT NOT NULL,
            page_numbers TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_source_file ON chunk_vectors(source_file)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_filename ON chunk_vectors(filename)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
