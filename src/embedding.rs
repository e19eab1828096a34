//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] capability trait and concrete
//! implementations:
//! - **[`OpenAiProvider`]** — OpenAI embeddings API; batched, no input-type hint.
//! - **[`VoyageProvider`]** — Voyage AI embeddings API; distinguishes
//!   `document` vs `query` inputs, which measurably improves retrieval even
//!   though both land in the same vector space.
//! - **`LocalProvider`** — in-process fastembed model behind the
//!   `local-embeddings` feature; no network calls after model download.
//!
//! Selection happens once at configuration time via [`create_provider`];
//! nothing downstream branches on provider names.
//!
//! # Retry Strategy
//!
//! Remote providers retry rate limits (HTTP 429) and server errors (5xx)
//! with exponential backoff (1s, 2s, 4s, 8s, ...) up to the configured
//! attempt ceiling. Exhausting retries fails the whole batch — and the run —
//! rather than silently dropping it. Other 4xx responses fail immediately.
//!
//! Also provides vector utilities for the SQLite collection:
//! [`vec_to_blob`], [`blob_to_vec`], and [`cosine_similarity`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Input-type hint for providers that embed queries and documents differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Document,
    Query,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Document => "document",
            InputType::Query => "query",
        }
    }
}

/// Capability trait for embedding backends.
///
/// The index-correspondence contract: `embed_batch` returns exactly one
/// vector per input text, in input order, each of length [`dims`](Self::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"voyage-4-large"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality (e.g. `1024`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, preserving index correspondence exactly.
    async fn embed_batch(&self, texts: &[String], input_type: InputType)
        -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self
            .embed_batch(&[text.to_string()], InputType::Query)
            .await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config value | Provider |
/// |--------------|----------|
/// | `"openai"` | [`OpenAiProvider`] |
/// | `"voyage"` | [`VoyageProvider`] |
/// | `"local"` | `LocalProvider` (requires `--features local-embeddings`) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "voyage" => Ok(Box::new(VoyageProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable. OpenAI has no input-type hint, so
/// queries and documents are embedded identically.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "text-embedding-3-large".to_string());
        let dims = config
            .dims
            .unwrap_or(if model.contains("3-large") { 3072 } else { 1536 });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _input_type: InputType,
    ) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_backoff(
            &self.client,
            "https://api.openai.com/v1/embeddings",
            &self.api_key,
            &body,
            self.max_retries,
        )
        .await?;
        let vectors = parse_embeddings_response(&json, texts.len())?;
        check_dims(&vectors, self.dims)?;
        Ok(vectors)
    }
}

// ============ Voyage Provider ============

/// Embedding provider using the Voyage AI REST API.
///
/// Calls `POST /v1/embeddings` with `input_type` set to `"document"` or
/// `"query"`. Requires the `VOYAGE_API_KEY` environment variable.
pub struct VoyageProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl VoyageProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("VOYAGE_API_KEY")
            .map_err(|_| anyhow::anyhow!("VOYAGE_API_KEY environment variable not set"))?;

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "voyage-4-large".to_string());
        let dims = config.dims.unwrap_or(voyage_default_dims(&model));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

fn voyage_default_dims(model: &str) -> usize {
    match model {
        "voyage-4-lite" | "voyage-3.5-lite" => 512,
        _ => 1024,
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "input_type": input_type.as_str(),
        });
        let json = post_with_backoff(
            &self.client,
            "https://api.voyageai.com/v1/embeddings",
            &self.api_key,
            &body,
            self.max_retries,
        )
        .await?;
        let vectors = parse_embeddings_response(&json, texts.len())?;
        check_dims(&vectors, self.dims)?;
        Ok(vectors)
    }
}

// ============ Local Provider (fastembed) ============

/// Embedding provider for local in-process inference via fastembed.
///
/// Models are downloaded on first use from Hugging Face and cached; after
/// that, embedding runs entirely offline. Queries and documents are embedded
/// identically.
#[cfg(feature = "local-embeddings")]
pub struct LocalProvider {
    model: String,
    dims: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        // Resolve the fastembed model now so a typo fails at startup.
        local_model_for(&model)?;
        let dims = config.dims.unwrap_or(match model.as_str() {
            "all-minilm-l6-v2" | "bge-small-en-v1.5" => 384,
            "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            _ => 384,
        });
        Ok(Self { model, dims })
    }
}

#[cfg(feature = "local-embeddings")]
fn local_model_for(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             bge-large-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _input_type: InputType,
    ) -> Result<Vec<Vec<f32>>> {
        let model = local_model_for(&self.model)?;
        let texts = texts.to_vec();
        let expected = self.dims;

        let vectors = tokio::task::spawn_blocking(move || {
            let mut embedder = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

            embedder
                .embed(texts, None)
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await??;

        check_dims(&vectors, expected)?;
        Ok(vectors)
    }
}

// ============ Shared request plumbing ============

/// POST a JSON body with Bearer auth, retrying rate limits and server
/// errors with exponential backoff (1s, 2s, 4s, ...). `max_retries` is the
/// total attempt ceiling; exhausting it is a hard error.
async fn post_with_backoff(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let attempts = max_retries.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err =
                        Some(anyhow::anyhow!("Embedding API error {}: {}", status, body_text));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("Embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("Rate limited after {} retries", attempts)))
}

/// Parse a `{ data: [{ index, embedding }] }` response into input order.
///
/// Both OpenAI and Voyage tag each item with its input index; items are
/// placed by that tag so the index-correspondence contract holds even if
/// the server reorders the array.
fn parse_embeddings_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    if data.len() != expected {
        bail!(
            "Embeddings response has {} items for {} inputs",
            data.len(),
            expected
        );
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, item) in data.iter().enumerate() {
        let idx = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        if idx >= expected {
            bail!("Embeddings response index {} out of range", idx);
        }

        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;
        slots[idx] = Some(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow::anyhow!("Missing embedding for input {}", i)))
        .collect()
}

/// Every vector must match the provider's fixed dimensionality; mixing
/// dimensionalities in one collection is invalid.
fn check_dims(vectors: &[Vec<f32>], dims: usize) -> Result<()> {
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dims {
            bail!(
                "Embedding {} has {} dimensions, expected {}",
                i,
                v.len(),
                dims
            );
        }
    }
    Ok(())
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes) for SQLite.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
