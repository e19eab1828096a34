//! # pagesift CLI
//!
//! The `pagesift` binary drives the ingestion pipeline stage by stage and
//! serves queries against the resulting collection.
//!
//! ## Usage
//!
//! ```bash
//! pagesift --config ./config/pagesift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pagesift init` | Create the collection database and schema |
//! | `pagesift chunk <dir>` | Extract and chunk every PDF under a directory |
//! | `pagesift embed` | Embed the chunk file via the configured provider |
//! | `pagesift load` | Upsert embedded chunks into the vector collection |
//! | `pagesift search "<query>"` | Hybrid search over the collection |
//! | `pagesift stats` | Show collection statistics |
//!
//! `chunk` and `embed` are resumable: each writes its output together with a
//! `.checkpoint` cursor and deletes the cursor only on clean completion, so
//! re-running after an interruption picks up where the run stopped.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagesift::progress::ProgressMode;
use pagesift::{config, embed_run, embedding, index, migrate, pipeline, search, stats};

/// pagesift — turn shelves of PDFs into a searchable hybrid index.
#[derive(Parser)]
#[command(
    name = "pagesift",
    about = "Crash-resumable PDF ingestion pipeline with hybrid retrieval",
    version,
    long_about = "pagesift ingests large PDF collections, splits them into \
    page-traceable chunks, embeds each chunk via a configurable provider, and \
    loads the result into a searchable vector collection with hybrid \
    (vector + keyword) ranking. Chunking and embedding are crash-resumable."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pagesift.toml")]
    config: PathBuf,

    /// Progress reporting on stderr: auto (TTY), human, json, or off.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the collection database schema.
    ///
    /// Creates the SQLite database file and the collection tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Extract and chunk every matching document under a directory.
    ///
    /// Walks the directory recursively, records every document's outcome in
    /// the ingestion ledger, and writes surviving chunks to the chunk output
    /// file. Interrupted runs resume from the checkpoint; documents already
    /// claimed in the ledger are skipped, never reprocessed.
    Chunk {
        /// Directory containing the source PDFs (scanned recursively).
        input_dir: PathBuf,

        /// Ignore an existing checkpoint instead of resuming from it.
        #[arg(long)]
        no_resume: bool,

        /// Maximum number of documents to consider this run.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Generate embeddings for the chunk output file.
    ///
    /// Submits chunk texts to the configured provider in batches, flushing
    /// output and checkpoint together after every batch. On restart, only
    /// chunks absent from the checkpoint are resubmitted.
    Embed {
        /// Ignore an existing checkpoint instead of resuming from it.
        #[arg(long)]
        no_resume: bool,

        /// Override the batch size from config (texts per API request).
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Load embedded chunks into the vector collection.
    ///
    /// Deduplicates by chunk id (last write wins) and upserts in batches.
    Load {
        /// Drop and recreate the collection before loading.
        #[arg(long)]
        reset: bool,
    },

    /// Search the collection with hybrid (vector + keyword) ranking.
    Search {
        /// The search query string.
        query: String,

        /// Number of results to return (defaults to retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,

        /// Keyword weight in [0, 1]; 0 = pure vector, 1 = pure keyword.
        #[arg(long)]
        weight: Option<f64>,

        /// Restrict results to one source file (absolute path).
        #[arg(long)]
        source: Option<String>,
    },

    /// Show collection statistics.
    Stats,
}

fn progress_mode(flag: &str) -> anyhow::Result<ProgressMode> {
    match flag {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        "off" => Ok(ProgressMode::Off),
        other => anyhow::bail!(
            "Unknown progress mode: {}. Use auto, human, json, or off.",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let reporter = progress_mode(&cli.progress)?.reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Chunk {
            input_dir,
            no_resume,
            limit,
        } => {
            pipeline::run_chunk(&cfg, &input_dir, !no_resume, limit, reporter.as_ref()).await?;
        }
        Commands::Embed {
            no_resume,
            batch_size,
        } => {
            let provider = embedding::create_provider(&cfg.embedding)?;
            embed_run::run_embed(
                &cfg,
                provider.as_ref(),
                batch_size,
                !no_resume,
                reporter.as_ref(),
            )
            .await?;
        }
        Commands::Load { reset } => {
            index::run_load(&cfg, reset, reporter.as_ref()).await?;
        }
        Commands::Search {
            query,
            top_k,
            weight,
            source,
        } => {
            search::run_search(&cfg, &query, top_k, weight, source).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
