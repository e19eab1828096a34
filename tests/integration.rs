//! End-to-end tests driving the `pagesift` binary.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::pdf_with_pages;

fn pagesift_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pagesift");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("alpha.pdf"),
        pdf_with_pages(&[
            "Sentence one about turbines. Sentence two about maintenance schedules.",
            "Sentence three continues on the second page of this report.",
        ]),
    )
    .unwrap();
    fs::write(
        docs_dir.join("beta.pdf"),
        pdf_with_pages(&["A single page about pump inspection. With a second sentence."]),
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/pagesift.sqlite"

[chunking]
chunk_size = 120
chunk_overlap = 20
min_chunk_size = 5

[ingest]
chunks_file = "{root}/output/chunks.json"
embedded_file = "{root}/output/embedded_chunks.json"
flush_every = 1
pause_secs = 0

[embedding]
provider = "voyage"

[retrieval]
keyword_weight = 0.3
top_k = 5
"#,
        root = root.display()
    );

    let config_path = root.join("config/pagesift.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pagesift(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pagesift_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        // Provider construction checks for the key; no request is made
        // before the stage-order checks these tests exercise.
        .env("VOYAGE_API_KEY", "test-key")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pagesift binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pagesift(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_pagesift(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_pagesift(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_chunk_processes_documents() {
    let (tmp, config_path) = setup_test_env();

    let docs = tmp.path().join("docs");
    let (stdout, stderr, success) =
        run_pagesift(&config_path, &["chunk", docs.to_str().unwrap()]);
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents found: 2"));
    assert!(stdout.contains("processed: 2"));
    assert!(stdout.contains("ok"));

    // Output, ledger tables; no leftover checkpoint.
    assert!(tmp.path().join("output/chunks.json").exists());
    assert!(tmp.path().join("output/todo.csv").exists());
    assert!(tmp.path().join("output/done.csv").exists());
    assert!(!tmp.path().join("output/chunks.json.checkpoint").exists());
}

#[test]
fn test_chunk_second_run_skips_claimed_documents() {
    let (tmp, config_path) = setup_test_env();
    let docs = tmp.path().join("docs");

    run_pagesift(&config_path, &["chunk", docs.to_str().unwrap()]);
    let (stdout, _, success) =
        run_pagesift(&config_path, &["chunk", docs.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("processed: 0"));
    assert!(stdout.contains("skipped: 2"));

    // Chunks from the first run are preserved.
    let chunks = fs::read_to_string(tmp.path().join("output/chunks.json")).unwrap();
    assert!(chunks.contains("alpha.pdf"));
    assert!(chunks.contains("beta.pdf"));
}

#[test]
fn test_embed_without_chunk_file_is_actionable() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pagesift(&config_path, &["embed"]);
    assert!(!success);
    assert!(stderr.contains("pagesift chunk"));
}

#[test]
fn test_embed_without_api_key_is_actionable() {
    let (_tmp, config_path) = setup_test_env();

    let binary = pagesift_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("embed")
        .env_remove("VOYAGE_API_KEY")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("VOYAGE_API_KEY"));
}

#[test]
fn test_load_without_embedded_file_is_actionable() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pagesift(&config_path, &["load"]);
    assert!(!success);
    assert!(stderr.contains("pagesift embed"));
}

#[test]
fn test_stats_on_empty_database() {
    let (_tmp, config_path) = setup_test_env();

    run_pagesift(&config_path, &["init"]);
    let (stdout, _, success) = run_pagesift(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Collection Stats"));
}

#[test]
fn test_missing_config_fails() {
    let (_tmp, _) = setup_test_env();
    let (_, stderr, success) =
        run_pagesift(Path::new("/nonexistent/pagesift.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}
