//! Output-paired resumable cursors.
//!
//! Each pipeline output file `<out>.json` is paired with `<out>.json.checkpoint`
//! holding the set of completed identities (document paths for the chunking
//! stage, chunk ids for the embedding stage) and a record count. The output is
//! always written before its checkpoint in the same flush, so a checkpoint can
//! never reference output that does not exist on disk.
//!
//! A checkpoint file's presence is the sole signal of an interrupted run:
//! clean completion deletes it.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub completed: Vec<String>,
    pub count: usize,
}

/// `<output>.checkpoint`, beside the output file.
pub fn checkpoint_path(output: &Path) -> PathBuf {
    let mut os = output.as_os_str().to_os_string();
    os.push(".checkpoint");
    PathBuf::from(os)
}

/// Load the completed-identity set of an interrupted run, if any.
///
/// An unreadable checkpoint is a pipeline-wide error: guessing at progress
/// risks silent duplication, so the run stops instead.
pub fn load(output: &Path) -> Result<Option<HashSet<String>>> {
    let path = checkpoint_path(output);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
    let checkpoint: Checkpoint = serde_json::from_str(&content)
        .with_context(|| format!("Corrupt checkpoint: {}", path.display()))?;
    Ok(Some(checkpoint.completed.into_iter().collect()))
}

/// Load previously accumulated output records, or an empty list if the
/// output file does not exist yet.
pub fn load_output<T: DeserializeOwned>(output: &Path) -> Result<Vec<T>> {
    if !output.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(output)
        .with_context(|| format!("Failed to read output file: {}", output.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Corrupt output file: {}", output.display()))
}

/// Write output and checkpoint together (output first).
pub fn flush<T: Serialize>(
    output: &Path,
    records: &[T],
    completed: &HashSet<String>,
) -> Result<()> {
    write_json(output, records)?;

    let mut ids: Vec<String> = completed.iter().cloned().collect();
    ids.sort();
    let checkpoint = Checkpoint {
        completed: ids,
        count: records.len(),
    };
    write_json(&checkpoint_path(output), &checkpoint)
}

/// Final write on clean completion: persist the output and delete the
/// checkpoint.
pub fn finalize<T: Serialize>(output: &Path, records: &[T]) -> Result<()> {
    write_json(output, records)?;
    clear(output)
}

/// Remove the checkpoint file if present.
pub fn clear(output: &Path) -> Result<()> {
    let path = checkpoint_path(output);
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove checkpoint: {}", path.display()))?;
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write: {}", path.display()))
}
