//! Chunking-stage integration tests over real (synthetic) PDFs.
//!
//! Exercises extraction, chunking, the ingestion ledger, and checkpoint
//! resumption end to end through the library API.

mod common;

use std::collections::BTreeSet;
use std::path::Path;

use common::pdf_with_pages;
use pagesift::checkpoint;
use pagesift::config::{ChunkingConfig, Config, DbConfig, IngestConfig};
use pagesift::extract;
use pagesift::models::Chunk;
use pagesift::pipeline::run_chunk;
use pagesift::progress::NoProgress;

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("index.sqlite"),
        },
        chunking: ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
            min_chunk_size: 5,
        },
        ingest: IngestConfig {
            chunks_file: root.join("output/chunks.json"),
            embedded_file: root.join("output/embedded_chunks.json"),
            flush_every: 1,
            pause_secs: 0,
            ..Default::default()
        },
        embedding: Default::default(),
        index: Default::default(),
        retrieval: Default::default(),
    }
}

fn write_corpus(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("alpha.pdf"),
        pdf_with_pages(&[
            "Sentence one about turbines. Sentence two about maintenance.",
            "Sentence three continues on the second page of this report.",
        ]),
    )
    .unwrap();
    std::fs::write(
        dir.join("beta.pdf"),
        pdf_with_pages(&["A single page document with a couple of sentences. Here is another."]),
    )
    .unwrap();
    std::fs::write(
        dir.join("gamma.pdf"),
        pdf_with_pages(&[
            "First page of gamma mentions pumps and valves in passing.",
            "Second page of gamma covers inspection intervals in detail.",
            "Third page of gamma closes with a short summary of findings.",
        ]),
    )
    .unwrap();
}

fn chunk_fingerprint(chunks: &[Chunk]) -> BTreeSet<(String, String)> {
    chunks
        .iter()
        .map(|c| (c.chunk_id.clone(), c.text.clone()))
        .collect()
}

#[test]
fn extraction_preserves_page_granularity() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("two.pdf");
    std::fs::write(
        &path,
        pdf_with_pages(&["Alpha page text here.", "Beta page text here."]),
    )
    .unwrap();

    let pages = extract::extract_pages(&path).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page, 1);
    assert_eq!(pages[1].page, 2);
    assert!(pages[0].text.contains("Alpha"));
    assert!(pages[1].text.contains("Beta"));
}

#[test]
fn document_info_reads_page_count() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("three.pdf");
    std::fs::write(&path, pdf_with_pages(&["One.", "Two.", "Three."])).unwrap();

    let info = extract::read_document_info(&path);
    assert_eq!(info.filename, "three.pdf");
    assert_eq!(info.num_pages, 3);
    assert!(info.file_size > 0);
}

#[tokio::test]
async fn full_run_chunks_every_document() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);

    let config = test_config(tmp.path());
    run_chunk(&config, &docs, true, None, &NoProgress)
        .await
        .unwrap();

    let chunks: Vec<Chunk> = checkpoint::load_output(&config.ingest.chunks_file).unwrap();
    assert!(!chunks.is_empty());

    // Every document produced at least one chunk.
    let sources: BTreeSet<&str> = chunks.iter().map(|c| c.metadata.filename.as_str()).collect();
    assert_eq!(
        sources,
        ["alpha.pdf", "beta.pdf", "gamma.pdf"].into_iter().collect()
    );

    // Page numbers are 1-based and within each document's page count.
    for chunk in &chunks {
        assert!(!chunk.page_numbers.is_empty());
        assert!(*chunk.page_numbers.first().unwrap() >= 1);
        assert!(*chunk.page_numbers.last().unwrap() as usize <= chunk.metadata.num_pages);
    }

    // total_chunks is consistent within each document.
    for chunk in &chunks {
        let doc_chunks = chunks
            .iter()
            .filter(|c| c.metadata.filename == chunk.metadata.filename)
            .count();
        assert_eq!(chunk.total_chunks, doc_chunks);
    }

    // No minimum-size violations.
    for chunk in &chunks {
        assert!(chunk.text.chars().count() >= config.chunking.min_chunk_size);
    }

    // Clean completion removed the checkpoint; ledger recorded every document.
    assert!(!checkpoint::checkpoint_path(&config.ingest.chunks_file).exists());
    let done = std::fs::read_to_string(tmp.path().join("output/done.csv")).unwrap();
    assert_eq!(done.lines().count(), 4); // header + 3 rows
}

#[tokio::test]
async fn interrupted_run_resumes_to_equivalent_output() {
    let tmp = tempfile::tempdir().unwrap();

    // Reference: one uninterrupted run.
    let full_root = tmp.path().join("full");
    std::fs::create_dir_all(&full_root).unwrap();
    let full_docs = full_root.join("docs");
    write_corpus(&full_docs);
    let full_config = test_config(&full_root);
    run_chunk(&full_config, &full_docs, true, None, &NoProgress)
        .await
        .unwrap();
    let full_chunks: Vec<Chunk> =
        checkpoint::load_output(&full_config.ingest.chunks_file).unwrap();

    // Interrupted: process two documents, then resume for the rest.
    let part_root = tmp.path().join("part");
    std::fs::create_dir_all(&part_root).unwrap();
    let part_docs = part_root.join("docs");
    write_corpus(&part_docs);
    let part_config = test_config(&part_root);
    run_chunk(&part_config, &part_docs, true, Some(2), &NoProgress)
        .await
        .unwrap();

    // Re-create the checkpoint the crash would have left behind, so the
    // second run resumes through the completed-set path.
    let partial: Vec<Chunk> =
        checkpoint::load_output(&part_config.ingest.chunks_file).unwrap();
    let completed: std::collections::HashSet<String> = partial
        .iter()
        .map(|c| {
            std::fs::canonicalize(&c.source_file)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| c.source_file.clone())
        })
        .collect();
    checkpoint::flush(&part_config.ingest.chunks_file, &partial, &completed).unwrap();

    run_chunk(&part_config, &part_docs, true, None, &NoProgress)
        .await
        .unwrap();
    let part_chunks: Vec<Chunk> =
        checkpoint::load_output(&part_config.ingest.chunks_file).unwrap();

    // Same final chunk set, as an unordered collection.
    assert_eq!(full_chunks.len(), part_chunks.len());
    assert_eq!(chunk_fingerprint(&full_chunks), chunk_fingerprint(&part_chunks));
}

#[tokio::test]
async fn rechunking_is_deterministic_across_runs() {
    let tmp = tempfile::tempdir().unwrap();

    let mut fingerprints = Vec::new();
    for run in 0..2 {
        let root = tmp.path().join(format!("run{}", run));
        std::fs::create_dir_all(&root).unwrap();
        let docs = root.join("docs");
        write_corpus(&docs);
        let config = test_config(&root);
        run_chunk(&config, &docs, true, None, &NoProgress)
            .await
            .unwrap();
        let chunks: Vec<Chunk> = checkpoint::load_output(&config.ingest.chunks_file).unwrap();
        fingerprints.push(chunk_fingerprint(&chunks));
    }

    assert_eq!(fingerprints[0], fingerprints[1]);
}
