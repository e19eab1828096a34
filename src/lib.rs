//! # pagesift
//!
//! A crash-resumable ingestion pipeline that turns large PDF collections
//! (hundreds of thousands of pages across thousands of files) into a
//! searchable vector index with hybrid (vector + keyword) retrieval.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │   PDFs    │──▶│ Chunker  │──▶│ Embedding │──▶│  Index   │──▶│  SQLite  │
//! │  (walk)   │   │ + Ledger │   │  Batcher  │   │  Loader  │   │collection│
//! └──────────┘   └────┬─────┘   └─────┬─────┘   └──────────┘   └────┬─────┘
//!                     │               │                             │
//!               chunks.json    embedded_chunks.json           Hybrid Ranker
//!              (+ checkpoint)     (+ checkpoint)               (query time)
//! ```
//!
//! Each stage persists its output as a JSON file paired with a
//! `.checkpoint` cursor, so a multi-hour run killed mid-flight resumes
//! without reprocessing or duplicating work. The ingestion ledger records
//! every document's outcome (`todo`/`done`/`skip`/`error`) in append-only
//! tables beside the output.
//!
//! ## Quick Start
//!
//! ```bash
//! pagesift init                    # create the collection database
//! pagesift chunk ./pdfs            # extract + chunk (resumable)
//! pagesift embed                   # generate embeddings (resumable)
//! pagesift load                    # upsert into the vector collection
//! pagesift search "heat exchanger maintenance"
//! pagesift stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`chunker`] | Sentence-aware, page-traceable chunking |
//! | [`ledger`] | Append-only per-document outcome tables |
//! | [`checkpoint`] | Output-paired resumable cursors |
//! | [`pipeline`] | Chunking-stage orchestration |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`embed_run`] | Embedding-stage orchestration |
//! | [`index`] | Vector collection: dedup, upsert, nearest-neighbor |
//! | [`search`] | Hybrid ranking and the query surface |
//! | [`stats`] | Collection statistics |

pub mod checkpoint;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embed_run;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod stats;
