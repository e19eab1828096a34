//! Append-only per-document outcome ledger.
//!
//! Four delimited tables record every document's trip through the chunking
//! stage: `todo` (written *before* processing starts), `done`, `skip`, and
//! `error` (written once the outcome is known). A crash mid-document leaves
//! the `todo` row behind, so a later run sees the document was claimed and
//! records it as skipped instead of silently reprocessing it.
//!
//! Storage is injected behind [`LedgerStore`], with a file-backed
//! implementation for production and an in-memory one for tests.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;

/// Maximum characters kept from an error message in the `error` table.
const ERROR_MSG_MAX: usize = 200;

/// The four ledger tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerTable {
    Todo,
    Done,
    Skip,
    Error,
}

impl LedgerTable {
    pub fn file_name(&self) -> &'static str {
        match self {
            LedgerTable::Todo => "todo.csv",
            LedgerTable::Done => "done.csv",
            LedgerTable::Skip => "skip.csv",
            LedgerTable::Error => "error.csv",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            LedgerTable::Todo | LedgerTable::Skip => &["date", "full_path", "filename"],
            LedgerTable::Done => &[
                "processed_date",
                "full_path",
                "filename",
                "file_modified_date",
                "file_size_bytes",
                "processing_sec",
            ],
            LedgerTable::Error => &[
                "attempt_date",
                "full_path",
                "filename",
                "file_modified_date",
                "file_size_bytes",
                "error_msg",
            ],
        }
    }
}

/// Backing storage for ledger rows. Rows are append-only and never rewritten.
pub trait LedgerStore: Send + Sync {
    /// Append one row to a table, creating it (with headers) if needed.
    fn append(&mut self, table: LedgerTable, row: &[String]) -> Result<()>;

    /// Load the `full_path` column of a table into a set.
    fn load_paths(&self, table: LedgerTable) -> Result<HashSet<String>>;
}

/// File-backed store: one `;`-delimited table per file in the output
/// directory, headers written on first append.
pub struct FileLedgerStore {
    dir: PathBuf,
}

impl FileLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn table_path(&self, table: LedgerTable) -> PathBuf {
        self.dir.join(table.file_name())
    }
}

impl LedgerStore for FileLedgerStore {
    fn append(&mut self, table: LedgerTable, row: &[String]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.table_path(table);
        let needs_header = !path.exists();

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open ledger table: {}", path.display()))?;

        if needs_header {
            writeln!(file, "{}", table.headers().join(";"))?;
        }
        let sanitized: Vec<String> = row.iter().map(|f| sanitize_field(f)).collect();
        writeln!(file, "{}", sanitized.join(";"))?;
        Ok(())
    }

    fn load_paths(&self, table: LedgerTable) -> Result<HashSet<String>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(HashSet::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ledger table: {}", path.display()))?;

        let mut paths = HashSet::new();
        for line in content.lines().skip(1) {
            if let Some(full_path) = line.split(';').nth(1) {
                let trimmed = full_path.trim();
                if !trimmed.is_empty() {
                    paths.insert(trimmed.to_string());
                }
            }
        }
        Ok(paths)
    }
}

/// In-memory store for unit tests.
#[derive(Default)]
pub struct MemoryLedgerStore {
    rows: HashMap<LedgerTable, Vec<Vec<String>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, table: LedgerTable) -> &[Vec<String>] {
        self.rows.get(&table).map(|r| r.as_slice()).unwrap_or(&[])
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn append(&mut self, table: LedgerTable, row: &[String]) -> Result<()> {
        self.rows.entry(table).or_default().push(row.to_vec());
        Ok(())
    }

    fn load_paths(&self, table: LedgerTable) -> Result<HashSet<String>> {
        Ok(self
            .rows
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter_map(|r| r.get(1).cloned())
                    .collect::<HashSet<_>>()
            })
            .unwrap_or_default())
    }
}

/// The ingestion ledger: the `todo` set loaded once per run for O(1) skip
/// detection, plus appenders for each outcome.
pub struct Ledger {
    store: Box<dyn LedgerStore>,
    queued: HashSet<String>,
}

impl Ledger {
    pub fn open(store: Box<dyn LedgerStore>) -> Result<Self> {
        let queued = store.load_paths(LedgerTable::Todo)?;
        Ok(Self { store, queued })
    }

    /// Whether a document was already claimed by this or a prior run.
    pub fn is_queued(&self, path: &str) -> bool {
        self.queued.contains(path)
    }

    /// Record a document as queued, *before* processing begins.
    pub fn mark_queued(&mut self, path: &str, filename: &str) -> Result<()> {
        self.store.append(
            LedgerTable::Todo,
            &[now_stamp(), path.to_string(), filename.to_string()],
        )?;
        self.queued.insert(path.to_string());
        Ok(())
    }

    /// Record a document found already queued by a prior or concurrent run.
    pub fn mark_skipped(&mut self, path: &str, filename: &str) -> Result<()> {
        self.store.append(
            LedgerTable::Skip,
            &[now_stamp(), path.to_string(), filename.to_string()],
        )
    }

    /// Record successful processing with elapsed time.
    pub fn mark_done(
        &mut self,
        path: &str,
        filename: &str,
        file_modified: &str,
        file_size: u64,
        elapsed_secs: f64,
    ) -> Result<()> {
        self.store.append(
            LedgerTable::Done,
            &[
                now_stamp(),
                path.to_string(),
                filename.to_string(),
                file_modified.to_string(),
                file_size.to_string(),
                format!("{:.2}", elapsed_secs),
            ],
        )
    }

    /// Record a failed document with a truncated error message.
    pub fn mark_error(
        &mut self,
        path: &str,
        filename: &str,
        file_modified: &str,
        file_size: u64,
        message: &str,
    ) -> Result<()> {
        let truncated: String = message.chars().take(ERROR_MSG_MAX).collect();
        self.store.append(
            LedgerTable::Error,
            &[
                now_stamp(),
                path.to_string(),
                filename.to_string(),
                file_modified.to_string(),
                file_size.to_string(),
                truncated,
            ],
        )
    }

}

/// The delimiter and row framing must survive arbitrary error messages.
fn sanitize_field(field: &str) -> String {
    field
        .replace(';', ",")
        .replace('\n', " ")
        .replace('\r', " ")
}

fn now_stamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
