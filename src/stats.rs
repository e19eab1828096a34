//! Collection statistics and health overview.
//!
//! A quick summary of what's indexed: record counts, distinct source
//! documents, and the pinned metric/dimensionality. Used by `pagesift stats`
//! to give confidence that chunking, embedding, and loading worked.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let has_collection: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunk_vectors'",
    )
    .fetch_one(&pool)
    .await?;

    if !has_collection {
        println!("pagesift — Collection Stats");
        println!("===========================");
        println!();
        println!("  Database:   {}", config.db.path.display());
        println!("  (empty — run `pagesift load` first)");
        pool.close().await;
        return Ok(());
    }

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(&pool)
        .await?;
    let total_sources: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT source_file) FROM chunk_vectors")
            .fetch_one(&pool)
            .await?;

    let meta: Option<(String, i64)> =
        sqlx::query_as("SELECT distance, dims FROM collection_meta WHERE name = ?")
            .bind(&config.index.collection)
            .fetch_optional(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("pagesift — Collection Stats");
    println!("===========================");
    println!();
    println!("  Database:   {}", config.db.path.display());
    println!("  Size:       {}", format_bytes(db_size));
    println!("  Collection: {}", config.index.collection);
    if let Some((distance, dims)) = &meta {
        println!("  Metric:     {} ({} dims)", distance, dims);
    }
    println!();
    println!("  Chunks:     {}", total_chunks);
    println!("  Documents:  {}", total_sources);

    // Largest documents by chunk count, a rough chunking-quality signal.
    let top_rows = sqlx::query(
        r#"
        SELECT filename, COUNT(*) AS chunk_count
        FROM chunk_vectors
        GROUP BY filename
        ORDER BY chunk_count DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !top_rows.is_empty() {
        println!();
        println!("  Top documents by chunk count:");
        for row in &top_rows {
            let filename: String = row.get("filename");
            let chunk_count: i64 = row.get("chunk_count");
            println!("  {:<48} {:>8}", filename, chunk_count);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_ranges() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
