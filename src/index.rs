//! Persistent vector collection: dedup, batch upsert, nearest-neighbor.
//!
//! The collection is a SQLite database owned by the index loader. Each entry
//! is keyed by `chunk_id` and stores the embedding (little-endian f32 BLOB),
//! the raw text, and metadata flattened to scalar columns — the multi-valued
//! page list is serialized as `"[1, 2]"` and parsed back by consumers.
//!
//! The distance metric and dimensionality are pinned in `collection_meta` at
//! creation time; loading with a different configuration is an error rather
//! than a silent mix. `--reset` drops and recreates the collection.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::checkpoint;
use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::EmbeddedChunk;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Load the embedded-chunk file into the collection.
pub async fn run_load(config: &Config, reset: bool, reporter: &dyn ProgressReporter) -> Result<()> {
    let embedded_file = &config.ingest.embedded_file;
    if !embedded_file.exists() {
        bail!(
            "Embedded chunk file not found: {}. Run `pagesift embed` first.",
            embedded_file.display()
        );
    }

    let records: Vec<EmbeddedChunk> = checkpoint::load_output(embedded_file)?;
    if records.is_empty() {
        println!("load");
        println!("  no records in {}", embedded_file.display());
        println!("ok");
        return Ok(());
    }

    let before = records.len();
    let records = dedup_last_wins(records);
    let duplicates = before - records.len();
    if duplicates > 0 {
        eprintln!("Warning: removed {} duplicate chunk ids", duplicates);
    }

    // One dimensionality per collection; a mixed file is invalid input.
    let dims = records[0].embedding.len();
    if dims == 0 {
        bail!("First record has an empty embedding");
    }
    for record in &records {
        if record.embedding.len() != dims {
            bail!(
                "Mixed embedding dimensionalities in {}: found {} and {}",
                embedded_file.display(),
                dims,
                record.embedding.len()
            );
        }
    }

    let pool = db::connect(config).await?;
    ensure_collection(&pool, config, dims, reset).await?;

    let total = records.len() as u64;
    let mut loaded = 0u64;
    for batch in records.chunks(config.index.load_batch_size) {
        let mut tx = pool.begin().await?;
        for record in batch {
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors
                    (chunk_id, embedding, text, source_file, filename, page_numbers, title, author)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    embedding = excluded.embedding,
                    text = excluded.text,
                    source_file = excluded.source_file,
                    filename = excluded.filename,
                    page_numbers = excluded.page_numbers,
                    title = excluded.title,
                    author = excluded.author
                "#,
            )
            .bind(&record.chunk.chunk_id)
            .bind(vec_to_blob(&record.embedding))
            .bind(&record.chunk.text)
            .bind(&record.chunk.source_file)
            .bind(&record.chunk.metadata.filename)
            .bind(format_page_numbers(&record.chunk.page_numbers))
            .bind(&record.chunk.metadata.title)
            .bind(&record.chunk.metadata.author)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        loaded += batch.len() as u64;
        reporter.report(ProgressEvent::Loading { n: loaded, total });
    }

    let count = collection_count(&pool).await?;

    println!("load");
    println!("  collection: {}", config.index.collection);
    println!("  records in file: {}", before);
    println!("  duplicates removed: {}", duplicates);
    println!("  upserted: {}", loaded);
    println!("  collection size: {}", count);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Keep only the last occurrence of each `chunk_id`, at its first position.
///
/// Repeated partial runs append to the same output file, so duplicates are
/// expected input, not an error; last write wins.
pub fn dedup_last_wins(records: Vec<EmbeddedChunk>) -> Vec<EmbeddedChunk> {
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<EmbeddedChunk> = Vec::new();
    for record in records {
        match by_id.get(&record.chunk.chunk_id) {
            Some(&i) => out[i] = record,
            None => {
                by_id.insert(record.chunk.chunk_id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Create the schema and pin (or verify) the collection's metric and dims.
async fn ensure_collection(
    pool: &SqlitePool,
    config: &Config,
    dims: usize,
    reset: bool,
) -> Result<()> {
    if reset {
        sqlx::query("DROP TABLE IF EXISTS chunk_vectors")
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM collection_meta WHERE name = ?")
            .bind(&config.index.collection)
            .execute(pool)
            .await
            .ok();
    }
    migrate::create_schema(pool).await?;

    let existing: Option<(String, i64)> =
        sqlx::query_as("SELECT distance, dims FROM collection_meta WHERE name = ?")
            .bind(&config.index.collection)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some((distance, existing_dims)) => {
            if distance != config.index.distance || existing_dims as usize != dims {
                bail!(
                    "Collection '{}' was created with distance={} dims={}; \
                     this load has distance={} dims={}. Reload with --reset to recreate.",
                    config.index.collection,
                    distance,
                    existing_dims,
                    config.index.distance,
                    dims
                );
            }
        }
        None => {
            sqlx::query(
                "INSERT INTO collection_meta (name, distance, dims, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&config.index.collection)
            .bind(&config.index.distance)
            .bind(dims as i64)
            .bind(chrono::Utc::now().timestamp())
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

pub async fn collection_count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(pool)
        .await?)
}

/// A nearest-neighbor candidate with its cosine distance.
#[derive(Debug, Clone)]
pub struct NearestChunk {
    pub chunk_id: String,
    pub text: String,
    /// Cosine distance `1 - cos(theta)`, in `[0, 2]`, ascending = closer.
    pub distance: f64,
    pub source_file: String,
    pub filename: String,
    pub page_numbers: String,
}

/// Brute-force nearest-neighbor search over the stored vectors, with an
/// optional `source_file` metadata filter.
pub async fn query_nearest(
    pool: &SqlitePool,
    query: &[f32],
    n: usize,
    source_filter: Option<&str>,
) -> Result<Vec<NearestChunk>> {
    let rows = match source_filter {
        Some(source) => {
            sqlx::query(
                "SELECT chunk_id, embedding, text, source_file, filename, page_numbers \
                 FROM chunk_vectors WHERE source_file = ?",
            )
            .bind(source)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT chunk_id, embedding, text, source_file, filename, page_numbers \
                 FROM chunk_vectors",
            )
            .fetch_all(pool)
            .await?
        }
    };

    let mut candidates: Vec<NearestChunk> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            let distance = 1.0 - cosine_similarity(query, &vector) as f64;
            NearestChunk {
                chunk_id: row.get("chunk_id"),
                text: row.get("text"),
                distance,
                source_file: row.get("source_file"),
                filename: row.get("filename"),
                page_numbers: row.get("page_numbers"),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(n);

    Ok(candidates)
}

/// Serialize a page list for scalar storage: `[1, 2]`.
pub fn format_page_numbers(pages: &[u32]) -> String {
    let parts: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Parse the stored representation back into the original list.
pub fn parse_page_numbers(s: &str) -> Vec<u32> {
    s.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}
