//! Hybrid ranking: vector similarity blended with lexical overlap.
//!
//! Retrieves `2k` nearest neighbors by cosine distance (over-fetch for
//! reranking headroom), scores each candidate as
//! `(1 - w) * vector_score + w * keyword_score`, and returns the top `k`.
//!
//! Score conventions (fixed here, documented once):
//! - `vector_score = max(0, 1 - distance)` — cosine distance ranges over
//!   `[0, 2]`, so the raw `1 - distance` is the cosine similarity in
//!   `[-1, 1]`; clamping at zero keeps the blend in `[0, 1]`.
//! - `keyword_score` — fraction of lowercase query tokens contained in the
//!   lowercase chunk text (substring containment).
//!
//! The final sort is stable, so ties keep their vector-rank order; with
//! `w = 0` the ranking equals pure vector ranking, with `w = 1` pure
//! keyword-overlap ranking.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{self, NearestChunk};
use crate::models::RankedChunk;

/// Fraction of query tokens present in the chunk text, case-insensitive.
pub fn keyword_score(query: &str, text: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let tokens: Vec<&str> = query_lower.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let hits = tokens.iter().filter(|t| text_lower.contains(**t)).count();
    hits as f64 / tokens.len() as f64
}

/// Score and rank vector-search candidates against the raw query text.
///
/// `candidates` must arrive in vector-rank order (ascending distance); the
/// stable sort then breaks score ties by that order.
pub fn rank_candidates(
    candidates: Vec<NearestChunk>,
    query: &str,
    keyword_weight: f64,
    top_k: usize,
) -> Vec<RankedChunk> {
    let mut ranked: Vec<RankedChunk> = candidates
        .into_iter()
        .map(|c| {
            let vector_score = (1.0 - c.distance).max(0.0);
            let kw = keyword_score(query, &c.text);
            RankedChunk {
                score: (1.0 - keyword_weight) * vector_score + keyword_weight * kw,
                vector_score,
                keyword_score: kw,
                chunk_id: c.chunk_id,
                text: c.text,
                source_file: c.source_file,
                filename: c.filename,
                page_numbers: index::parse_page_numbers(&c.page_numbers),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);
    ranked
}

/// The query surface: top-`k` chunks for a free-text query.
pub async fn hybrid_search(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
    keyword_weight: f64,
    source_filter: Option<&str>,
) -> Result<Vec<RankedChunk>> {
    let query_vec = provider.embed_query(query).await?;
    let candidates = index::query_nearest(pool, &query_vec, top_k * 2, source_filter).await?;
    Ok(rank_candidates(candidates, query, keyword_weight, top_k))
}

/// Run the search command and print ranked results.
pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    weight: Option<f64>,
    source_filter: Option<String>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let keyword_weight = weight.unwrap_or(config.retrieval.keyword_weight);
    if !(0.0..=1.0).contains(&keyword_weight) {
        bail!("--weight must be in [0.0, 1.0]");
    }
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;

    let has_collection: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunk_vectors'",
    )
    .fetch_one(&pool)
    .await?;
    if !has_collection {
        pool.close().await;
        bail!("Collection is empty. Run `pagesift load` first.");
    }

    let results = hybrid_search(
        &pool,
        provider.as_ref(),
        query,
        top_k,
        keyword_weight,
        source_filter.as_deref(),
    )
    .await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let pages: Vec<String> = result.page_numbers.iter().map(|p| p.to_string()).collect();
        println!(
            "{}. [{:.3}] {} (pages {})",
            i + 1,
            result.score,
            result.filename,
            pages.join(", ")
        );
        println!(
            "    vector: {:.3}  keyword: {:.3}",
            result.vector_score, result.keyword_score
        );
        println!("    source: {}", result.source_file);
        println!("    excerpt: \"{}\"", excerpt(&result.text, 240));
        println!("    id: {}", result.chunk_id);
        println!();
    }

    pool.close().await;
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    let trimmed = flattened.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
