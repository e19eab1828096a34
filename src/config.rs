use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters of trailing-sentence overlap between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks shorter than this (after trimming) are discarded, never emitted.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_min_chunk_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Chunk output file; the ledger tables live beside it.
    #[serde(default = "default_chunks_file")]
    pub chunks_file: PathBuf,
    #[serde(default = "default_embedded_file")]
    pub embedded_file: PathBuf,
    /// Flush output + checkpoint every N successfully processed documents.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    /// Politeness pause after each successfully processed document.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            chunks_file: default_chunks_file(),
            embedded_file: default_embedded_file(),
            flush_every: default_flush_every(),
            pause_secs: default_pause_secs(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}
fn default_chunks_file() -> PathBuf {
    PathBuf::from("./output/chunks.json")
}
fn default_embedded_file() -> PathBuf {
    PathBuf::from("./output/embedded_chunks.json")
}
fn default_flush_every() -> usize {
    100
}
fn default_pause_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Provider: `openai`, `voyage`, or `local`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name; each provider resolves a default when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimensionality; resolved from the model when unset.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Texts per provider request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Rate-limit retry ceiling per batch.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "voyage".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Distance metric, fixed at collection creation. Only `cosine` is supported.
    #[serde(default = "default_distance")]
    pub distance: String,
    /// Records per load transaction.
    #[serde(default = "default_load_batch_size")]
    pub load_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            distance: default_distance(),
            load_batch_size: default_load_batch_size(),
        }
    }
}

fn default_collection() -> String {
    "documents".to_string()
}
fn default_distance() -> String {
    "cosine".to_string()
}
fn default_load_batch_size() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Weight of lexical overlap in the hybrid blend, in [0, 1].
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            keyword_weight: default_keyword_weight(),
            top_k: default_top_k(),
        }
    }
}

fn default_keyword_weight() -> f64 {
    0.3
}
fn default_top_k() -> usize {
    10
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    if config.chunking.min_chunk_size > config.chunking.chunk_size {
        anyhow::bail!("chunking.min_chunk_size must not exceed chunking.chunk_size");
    }

    // Validate ingest
    if config.ingest.flush_every == 0 {
        anyhow::bail!("ingest.flush_every must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "openai" | "voyage" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, voyage, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }

    // Validate index
    if config.index.distance != "cosine" {
        anyhow::bail!(
            "Unsupported distance metric: '{}'. Only cosine is supported.",
            config.index.distance
        );
    }
    if config.index.load_batch_size == 0 {
        anyhow::bail!("index.load_batch_size must be > 0");
    }

    // Validate retrieval
    if !(0.0..=1.0).contains(&config.retrieval.keyword_weight) {
        anyhow::bail!("retrieval.keyword_weight must be in [0.0, 1.0]");
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let f = write_config("[db]\npath = \"./data/test.sqlite\"\n");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert_eq!(cfg.chunking.min_chunk_size, 100);
        assert_eq!(cfg.embedding.provider, "voyage");
        assert_eq!(cfg.index.distance, "cosine");
        assert!((cfg.retrieval.keyword_weight - 0.3).abs() < 1e-9);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let f = write_config(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let f = write_config("[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"cohere\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn non_cosine_distance_rejected() {
        let f = write_config("[db]\npath = \"x.sqlite\"\n[index]\ndistance = \"l2\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn keyword_weight_out_of_range_rejected() {
        let f = write_config("[db]\npath = \"x.sqlite\"\n[retrieval]\nkeyword_weight = 1.5\n");
        assert!(load_config(f.path()).is_err());
    }
}
