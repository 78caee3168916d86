//! End-to-end tests that drive the `repo-help` binary against a local
//! corpus and a SQLite store. No network provider is configured, so
//! these cover wiring, reporting and exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_repo-help"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let corpus = root.join("corpus").join("acme").join("widgets");
    fs::create_dir_all(corpus.join("src")).unwrap();
    fs::write(
        corpus.join("src/login.js"),
        "export function login(user) {\n  return api.post('/login', user);\n}\n",
    )
    .unwrap();
    fs::write(corpus.join("README.md"), "# Widgets\n\nA widget shop.\n").unwrap();
    fs::write(corpus.join("logo.svg"), "<svg/>").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[store]
backend = "sqlite"
path = "{root}/data/repo-help.sqlite"

[ingest]
concurrency = 2

[embedding]
provider = "disabled"
max_attempts = 1
backoff_ms = 1

[llm]
provider = "disabled"

[source]
kind = "local"
root = "{root}/corpus"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("repo-help.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run repo-help binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_store() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Store ready (sqlite, 0 entries)"));
    assert!(tmp.path().join("data/repo-help.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run(&config_path, &["init"]);
    assert!(first, "first init failed");
    let (_, _, second) = run(&config_path, &["init"]);
    assert!(second, "second init failed (not idempotent)");
}

#[test]
fn test_list_empty_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run(&config_path, &["list"]);
    assert!(success, "list failed: stderr={}", stderr);
    assert!(stdout.contains("No entries on page 1 (0 total)"));
}

#[test]
fn test_ingest_reports_failed_files_without_embeddings() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run(&config_path, &["ingest", "acme/widgets"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("stored:    0"));
    assert!(stdout.contains("failed:    2"));
    assert!(stdout.contains("- README.md"));
    assert!(stdout.contains("- src/login.js"));
    assert!(!stdout.contains("logo.svg"));
}

#[test]
fn test_ingest_rejects_bad_repo() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run(&config_path, &["ingest", "widgets"]);
    assert!(!success);
    assert!(stderr.contains("owner/project"));
}

#[test]
fn test_query_without_fields_is_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run(&config_path, &["query", "acme/widgets"]);
    assert!(!success);
    assert!(stderr.contains("invalid request"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[ingest]\nconcurrency = 0\n").unwrap();

    let (_, stderr, success) = run(&bad, &["list"]);
    assert!(!success);
    assert!(stderr.contains("concurrency"));
}
