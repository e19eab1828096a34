//! Core data models used throughout pagesift.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and retrieval pipeline. Chunk records are serialized
//! to the chunk output file as a JSON array; embedded chunk records add the
//! `embedding` field and land in the embedded output file.

use serde::{Deserialize, Serialize};

/// Document-level attributes captured once per source file and carried on
/// every chunk derived from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    /// File name without directories (e.g. `report.pdf`).
    pub filename: String,
    /// Absolute path of the source file.
    pub filepath: String,
    pub file_size: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub num_pages: usize,
}

/// A retrieval unit: a bounded, page-traceable slice of one document.
///
/// `chunk_id` is derived deterministically from `(filename, chunk_index)`,
/// so re-chunking an unchanged document with identical parameters yields
/// identical ids. `total_chunks` is back-filled once all chunks for the
/// document are known; every other field is set once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    /// Absolute path of the originating document.
    pub source_file: String,
    /// Ordered 1-based page numbers the chunk's text spans.
    pub page_numbers: Vec<u32>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Character count of the chunk text, kept for chunking-quality diagnostics.
    pub char_count: usize,
    pub metadata: DocumentInfo,
}

/// A [`Chunk`] plus its embedding vector. Immutable once created.
///
/// The vector's dimensionality is fixed by the provider/model pair used for
/// the whole collection; the index loader rejects mixed dimensionalities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A ranked result returned from the query surface.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk_id: String,
    pub text: String,
    /// Blended score: `(1 - w) * vector_score + w * keyword_score`.
    pub score: f64,
    pub vector_score: f64,
    pub keyword_score: f64,
    pub source_file: String,
    pub filename: String,
    pub page_numbers: Vec<u32>,
}
