//! Embedding-stage orchestration.
//!
//! Reads the chunk output file, embeds every chunk whose id is not in the
//! stage checkpoint, and appends the results to the embedded output file.
//! Output and checkpoint are flushed together after every batch, so an
//! interrupted run resumes by resubmitting only the chunks whose ids are
//! absent from the checkpoint.
//!
//! Index correspondence is enforced here as well as in the providers:
//! vector *i* always belongs to text *i*, and every vector must match the
//! provider's dimensionality.

use anyhow::{bail, Result};
use std::collections::HashSet;

use crate::checkpoint;
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, InputType};
use crate::models::{Chunk, EmbeddedChunk};
use crate::progress::{ProgressEvent, ProgressReporter};

pub async fn run_embed(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    batch_size_override: Option<usize>,
    resume: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let chunks_file = &config.ingest.chunks_file;
    let output_file = &config.ingest.embedded_file;

    if !chunks_file.exists() {
        bail!(
            "Chunk file not found: {}. Run `pagesift chunk <dir>` first.",
            chunks_file.display()
        );
    }
    let chunks: Vec<Chunk> = checkpoint::load_output(chunks_file)?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size).max(1);

    // An interrupted run left a checkpoint; resume from it. Otherwise start
    // fresh and overwrite any prior (complete) output.
    let mut processed: HashSet<String> = HashSet::new();
    let mut embedded: Vec<EmbeddedChunk> = Vec::new();
    if resume {
        if let Some(cp) = checkpoint::load(output_file)? {
            if !output_file.exists() {
                bail!(
                    "Checkpoint exists but output file {} is missing. \
                     Delete {} to start over.",
                    output_file.display(),
                    checkpoint::checkpoint_path(output_file).display()
                );
            }
            processed = cp;
            embedded = checkpoint::load_output(output_file)?;
            eprintln!("Resuming: {} chunks already embedded", processed.len());
        }
    } else {
        checkpoint::clear(output_file)?;
    }

    let pending: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| !processed.contains(&c.chunk_id))
        .collect();

    let total = pending.len() as u64;
    let mut submitted = 0u64;

    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider.embed_batch(&texts, InputType::Document).await?;

        if vectors.len() != batch.len() {
            bail!(
                "Provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            );
        }

        for (chunk, vector) in batch.iter().zip(vectors.into_iter()) {
            if vector.len() != provider.dims() {
                bail!(
                    "Embedding for chunk {} has {} dimensions, expected {}",
                    chunk.chunk_id,
                    vector.len(),
                    provider.dims()
                );
            }
            processed.insert(chunk.chunk_id.clone());
            embedded.push(EmbeddedChunk {
                chunk: (*chunk).clone(),
                embedding: vector,
            });
        }

        // Flush output + checkpoint together after every batch.
        checkpoint::flush(output_file, &embedded, &processed)?;

        submitted += batch.len() as u64;
        reporter.report(ProgressEvent::Embedding {
            n: submitted,
            total,
        });
    }

    checkpoint::finalize(output_file, &embedded)?;

    println!("embed");
    println!("  model: {} ({} dims)", provider.model_name(), provider.dims());
    println!("  chunks total: {}", chunks.len());
    println!("  embedded this run: {}", submitted);
    println!("  output records: {}", embedded.len());
    println!("  output: {}", output_file.display());
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, IngestConfig};
    use crate::models::DocumentInfo;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic in-memory provider: vector derived from the text, one
    /// call counted per batch.
    struct MockProvider {
        dims: usize,
        batches: AtomicUsize,
    }

    impl MockProvider {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                batches: AtomicUsize::new(0),
            }
        }

        fn vector_for(text: &str, dims: usize) -> Vec<f32> {
            (0..dims)
                .map(|i| (text.len() as f32) + (i as f32) + (text.as_bytes()[0] as f32) / 256.0)
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        fn model_name(&self) -> &str {
            "mock"
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_batch(
            &self,
            texts: &[String],
            _input_type: InputType,
        ) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| Self::vector_for(t, self.dims))
                .collect())
        }
    }

    /// Provider whose vectors never match its declared dimensionality.
    struct BadDimsProvider;

    #[async_trait]
    impl EmbeddingProvider for BadDimsProvider {
        fn model_name(&self) -> &str {
            "bad"
        }

        fn dims(&self) -> usize {
            4
        }

        async fn embed_batch(
            &self,
            texts: &[String],
            _input_type: InputType,
        ) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 2.0, 3.0]).collect())
        }
    }

    fn make_chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            source_file: "/docs/a.pdf".to_string(),
            page_numbers: vec![1],
            chunk_index: 0,
            total_chunks: 1,
            char_count: text.chars().count(),
            metadata: DocumentInfo {
                filename: "a.pdf".to_string(),
                filepath: "/docs/a.pdf".to_string(),
                ..Default::default()
            },
        }
    }

    fn test_config(root: &Path) -> Config {
        Config {
            db: DbConfig {
                path: root.join("index.sqlite"),
            },
            chunking: Default::default(),
            ingest: IngestConfig {
                chunks_file: root.join("chunks.json"),
                embedded_file: root.join("embedded_chunks.json"),
                ..Default::default()
            },
            embedding: Default::default(),
            index: Default::default(),
            retrieval: Default::default(),
        }
    }

    fn write_chunks(config: &Config, chunks: &[Chunk]) {
        std::fs::write(
            &config.ingest.chunks_file,
            serde_json::to_string_pretty(chunks).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn vectors_keep_index_correspondence() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let chunks = vec![
            make_chunk("id-0", "first chunk text"),
            make_chunk("id-1", "second chunk, somewhat longer text"),
            make_chunk("id-2", "third"),
        ];
        write_chunks(&config, &chunks);

        let provider = MockProvider::new(4);
        run_embed(&config, &provider, None, true, &crate::progress::NoProgress)
            .await
            .unwrap();

        let embedded: Vec<EmbeddedChunk> =
            checkpoint::load_output(&config.ingest.embedded_file).unwrap();
        assert_eq!(embedded.len(), 3);
        for (chunk, record) in chunks.iter().zip(embedded.iter()) {
            assert_eq!(record.chunk.chunk_id, chunk.chunk_id);
            assert_eq!(record.embedding, MockProvider::vector_for(&chunk.text, 4));
        }
        assert!(!checkpoint::checkpoint_path(&config.ingest.embedded_file).exists());
    }

    #[tokio::test]
    async fn resume_only_submits_unprocessed_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let chunks = vec![
            make_chunk("id-0", "already embedded text"),
            make_chunk("id-1", "pending one"),
            make_chunk("id-2", "pending two"),
        ];
        write_chunks(&config, &chunks);

        // Simulate an interrupted run: first chunk embedded, checkpoint present.
        let prior = vec![EmbeddedChunk {
            chunk: chunks[0].clone(),
            embedding: MockProvider::vector_for(&chunks[0].text, 4),
        }];
        let done: HashSet<String> = ["id-0".to_string()].into_iter().collect();
        checkpoint::flush(&config.ingest.embedded_file, &prior, &done).unwrap();

        let provider = MockProvider::new(4);
        run_embed(
            &config,
            &provider,
            Some(1),
            true,
            &crate::progress::NoProgress,
        )
        .await
        .unwrap();

        // One batch per pending chunk, none for the completed one.
        assert_eq!(provider.batches.load(Ordering::SeqCst), 2);

        let embedded: Vec<EmbeddedChunk> =
            checkpoint::load_output(&config.ingest.embedded_file).unwrap();
        let ids: Vec<&str> = embedded.iter().map(|e| e.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["id-0", "id-1", "id-2"]);
        assert!(!checkpoint::checkpoint_path(&config.ingest.embedded_file).exists());
    }

    #[tokio::test]
    async fn missing_chunk_file_is_actionable_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let provider = MockProvider::new(4);

        let err = run_embed(&config, &provider, None, true, &crate::progress::NoProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pagesift chunk"));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        write_chunks(&config, &[make_chunk("id-0", "some text")]);

        let err = run_embed(
            &config,
            &BadDimsProvider,
            None,
            true,
            &crate::progress::NoProgress,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }
}
