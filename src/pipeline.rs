//! Chunking-stage orchestration.
//!
//! Coordinates the first pipeline stage: walk the input directory, run each
//! document through extraction and chunking, record every outcome in the
//! ingestion ledger, and flush the accumulated chunk set plus a checkpoint
//! every N successfully processed documents. A crash loses at most the
//! partial batch since the last flush; on restart, completed documents are
//! skipped outright and prior output is preserved.
//!
//! Per-document failures are never fatal to the run: the document is recorded
//! in the `error` table and processing continues.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::checkpoint;
use crate::chunker::Chunker;
use crate::config::Config;
use crate::extract;
use crate::ledger::{FileLedgerStore, Ledger};
use crate::models::Chunk;
use crate::progress::{ProgressEvent, ProgressReporter};

pub async fn run_chunk(
    config: &Config,
    input_dir: &Path,
    resume: bool,
    limit: Option<usize>,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    if !input_dir.exists() {
        bail!("Input directory does not exist: {}", input_dir.display());
    }

    let output_file = &config.ingest.chunks_file;
    let output_dir = output_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)?;

    let mut ledger = Ledger::open(Box::new(FileLedgerStore::new(&output_dir)))?;

    // Resume state: the checkpoint names documents whose chunks are already
    // in the output file; the output file itself is reloaded so the final
    // write is the union of all runs.
    let completed: HashSet<String> = if resume {
        match checkpoint::load(output_file)? {
            Some(cp) => {
                if !output_file.exists() {
                    bail!(
                        "Checkpoint exists but output file {} is missing. \
                         Delete {} to start over.",
                        output_file.display(),
                        checkpoint::checkpoint_path(output_file).display()
                    );
                }
                cp
            }
            None => HashSet::new(),
        }
    } else {
        checkpoint::clear(output_file)?;
        HashSet::new()
    };
    let mut completed = completed;
    let mut all_chunks: Vec<Chunk> = checkpoint::load_output(output_file)?;

    reporter.report(ProgressEvent::Scanning {
        dir: input_dir.display().to_string(),
    });
    let mut files = scan_documents(input_dir, config)?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }

    if !completed.is_empty() {
        eprintln!(
            "Resuming: {} documents already processed",
            completed.len()
        );
    }

    let chunker = Chunker::new(&config.chunking);
    let total = files.len() as u64;
    let mut done = 0u64;
    let mut skipped = 0u64;
    let mut errors = 0u64;
    let mut since_flush = 0usize;

    for (idx, path) in files.iter().enumerate() {
        // The canonical absolute path is the document's identity everywhere:
        // ledger rows, checkpoint entries, and chunk source_file fields.
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        let path_str = canonical.display().to_string();
        let filename = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Already completed per the checkpoint: skip outright.
        if completed.contains(&path_str) {
            continue;
        }

        // Claimed by a prior or concurrent run sharing this ledger.
        if ledger.is_queued(&path_str) {
            ledger.mark_skipped(&path_str, &filename)?;
            skipped += 1;
            continue;
        }

        // Register in the todo table *before* processing, so a crash
        // mid-document still leaves a record that it was attempted.
        ledger.mark_queued(&path_str, &filename)?;

        let (file_size, file_modified) = file_stat(&canonical);
        let started = Instant::now();

        match process_document(&chunker, &canonical) {
            Ok(chunks) if chunks.is_empty() => {
                ledger.mark_error(
                    &path_str,
                    &filename,
                    &file_modified,
                    file_size,
                    "No text extracted (empty or unreadable PDF)",
                )?;
                errors += 1;
            }
            Ok(chunks) => {
                let elapsed = started.elapsed().as_secs_f64();
                all_chunks.extend(chunks);
                completed.insert(path_str.clone());
                ledger.mark_done(&path_str, &filename, &file_modified, file_size, elapsed)?;
                done += 1;
                since_flush += 1;

                if since_flush >= config.ingest.flush_every {
                    checkpoint::flush(output_file, &all_chunks, &completed)?;
                    since_flush = 0;
                }

                // Politeness pause before the next document.
                if config.ingest.pause_secs > 0 {
                    tokio::time::sleep(std::time::Duration::from_secs(config.ingest.pause_secs))
                        .await;
                }
            }
            Err(e) => {
                ledger.mark_error(
                    &path_str,
                    &filename,
                    &file_modified,
                    file_size,
                    &e.to_string(),
                )?;
                errors += 1;
            }
        }

        reporter.report(ProgressEvent::Chunking {
            n: (idx + 1) as u64,
            total,
        });
    }

    // Clean completion: persist the output and drop the checkpoint.
    checkpoint::finalize(output_file, &all_chunks)?;

    println!("chunk {}", input_dir.display());
    println!("  documents found: {}", files.len());
    println!("  processed: {}", done);
    println!("  skipped: {}", skipped);
    println!("  errors: {}", errors);
    println!("  total chunks: {}", all_chunks.len());
    println!("  output: {}", output_file.display());
    println!("ok");

    Ok(())
}

/// Extract and chunk one document. An `Err` here means extraction failed
/// outright; `Ok(vec![])` means the document parsed but yielded no text.
fn process_document(chunker: &Chunker, path: &Path) -> Result<Vec<Chunk>> {
    let pages = extract::extract_pages(path)?;
    if pages.is_empty() {
        return Ok(Vec::new());
    }
    let metadata = extract::read_document_info(path);
    Ok(chunker.chunk_pages(&pages, &metadata))
}

/// Walk the input directory and return matching document paths, sorted for
/// deterministic ordering.
fn scan_documents(input_dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.ingest.include_globs)?;
    let exclude_set = build_globset(&config.ingest.exclude_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(input_dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// File size and modification time for ledger rows; unreadable stat yields
/// zero/empty like the rest of the metadata path.
fn file_stat(path: &Path) -> (u64, String) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let size = meta.len();
            let modified = meta
                .modified()
                .ok()
                .map(|t| {
                    chrono::DateTime::<chrono::Utc>::from(t)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_default();
            (size, modified)
        }
        Err(_) => (0, String::new()),
    }
}
