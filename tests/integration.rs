//! End-to-end tests that drive the `fctx` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use filing_context::manifest::{CacheLayout, Manifest};
use filing_context::models::{CachedDocument, Entity};
use tempfile::TempDir;

const CIK: &str = "0000000042";

fn fctx_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fctx"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("0000000042-24-000060.txt"),
        "# Item 5.02\nPersis Drell resigned from the Board effective immediately.\nNo disagreement with company operations.",
    )
    .unwrap();
    fs::write(
        files_dir.join("10q.md"),
        "Quarterly report\n\nRevenue decreased in the quarter.\n\nInventory built up.",
    )
    .unwrap();
    fs::write(files_dir.join("notes.bin"), "resigned resigned resigned").unwrap();

    let config_content = format!(
        r#"[cache]
root = "{}/cache"

[chunking]
chunk_lines = 40
chunk_overlap = 10

[retrieval]
top_k = 5
include_globs = ["**/*.md", "**/*.txt"]

[edgar]
user_agent = "Filing Context Tests tests@example.com"
tickers_url = "http://127.0.0.1:9/company_tickers.json"
max_retries = 0
timeout_secs = 2
"#,
        root.display()
    );

    let config_path = config_dir.join("fctx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// Write a one-document manifest for `CIK` into the test cache.
fn seed_cache(root: &Path) -> CacheLayout {
    let layout = CacheLayout::new(root.join("cache"));
    let doc_path = layout.document_path(CIK, "0000000042-24-000060");
    fs::create_dir_all(doc_path.parent().unwrap()).unwrap();
    fs::write(
        &doc_path,
        "# Item 5.02\nPersis Drell resigned from the Board effective immediately.",
    )
    .unwrap();

    let manifest = Manifest::new(
        Entity {
            cik: CIK.to_string(),
            ticker: Some("ACME".to_string()),
            name: Some("Acme Corp".to_string()),
        },
        "core",
        vec![CachedDocument {
            accession: "0000000042-24-000060".to_string(),
            form: "8-K".to_string(),
            filing_date: Some("2024-09-12".to_string()),
            report_date: None,
            url: None,
            path: doc_path,
        }],
    );
    layout.write_manifest(&manifest).unwrap();
    layout
}

fn run_fctx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = fctx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("FCTX_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fctx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_profiles_lists_core() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fctx(&config_path, &["profiles"]);
    assert!(success, "profiles failed: {}", stderr);
    assert!(stdout.contains("core"));
    assert!(stdout.contains("10-K"));
    assert!(stdout.contains("365d"));
}

#[test]
fn test_profiles_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_fctx(&config_path, &["--json", "profiles"]);
    assert!(success);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let names: Vec<&str> = parsed
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert!(names.contains(&"core"));
    assert!(names.contains(&"events"));
}

#[test]
fn test_ask_directory() {
    let (tmp, config_path) = setup_test_env();
    let files = tmp.path().join("files");

    let (stdout, stderr, success) = run_fctx(
        &config_path,
        &["ask", "board resigned", "--doc", files.to_str().unwrap()],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. ["));
    assert!(stdout.contains("0000000042-24-000060"));
    assert!(!stdout.contains("notes.bin"));
}

#[test]
fn test_ask_json_output() {
    let (tmp, config_path) = setup_test_env();
    let doc = tmp.path().join("files/10q.md");

    let (stdout, stderr, success) = run_fctx(
        &config_path,
        &["--json", "ask", "revenue quarter", "--doc", doc.to_str().unwrap()],
    );
    assert!(success, "ask failed: {}", stderr);

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["query_terms"][0], "revenue");
    assert_eq!(parsed["result_count"], 1);
    let top = &parsed["results"][0];
    assert_eq!(top["rank"], 1);
    assert_eq!(top["line_start"], 1);
    assert!(top["score"].as_f64().unwrap() > 0.0);
    assert!(top.get("reference_id").is_none());
}

#[test]
fn test_ask_deterministic() {
    let (tmp, config_path) = setup_test_env();
    let files = tmp.path().join("files");
    let args = ["--json", "ask", "quarter revenue", "--doc", files.to_str().unwrap()];

    let (stdout1, _, _) = run_fctx(&config_path, &args);
    let (stdout2, _, _) = run_fctx(&config_path, &args);
    assert_eq!(stdout1, stdout2);
}

#[test]
fn test_ask_requires_a_corpus() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_fctx(&config_path, &["ask", "revenue"]);
    assert!(!success);
    assert!(stderr.contains("--doc") || stderr.contains("required"));
}

#[test]
fn test_ask_rejects_bad_overlap() {
    let (tmp, config_path) = setup_test_env();
    let doc = tmp.path().join("files/10q.md");

    let (_, stderr, success) = run_fctx(
        &config_path,
        &[
            "ask",
            "revenue",
            "--doc",
            doc.to_str().unwrap(),
            "--chunk-lines",
            "5",
            "--chunk-overlap",
            "5",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_ask_missing_doc_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("files/missing.txt");

    let (_, stderr, success) =
        run_fctx(&config_path, &["ask", "revenue", "--doc", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);
}

#[test]
fn test_manifest_show_and_ask_from_manifest() {
    let (tmp, config_path) = setup_test_env();
    let layout = seed_cache(tmp.path());

    let (stdout, stderr, success) = run_fctx(&config_path, &["manifest", "42"]);
    assert!(success, "manifest failed: {}", stderr);
    assert!(stdout.contains("0000000042-24-000060"));
    assert!(stdout.contains("Acme Corp"));

    let manifest_path = layout.manifest_path(CIK, "core");
    let (stdout, stderr, success) = run_fctx(
        &config_path,
        &[
            "ask",
            "resigned board",
            "--manifest",
            manifest_path.to_str().unwrap(),
        ],
    );
    assert!(success, "ask --manifest failed: {}", stderr);
    assert!(stdout.contains("resigned"));
}

#[test]
fn test_ask_entity_uses_cache_without_sync() {
    let (tmp, config_path) = setup_test_env();
    seed_cache(tmp.path());

    let (stdout, stderr, success) = run_fctx(
        &config_path,
        &["--json", "ask", "board resigned", "--entity", "42", "--no-sync"],
    );
    assert!(success, "ask --entity failed: {}", stderr);

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["entity"]["cik"], CIK);
    assert_eq!(parsed["corpus_docs_count"], 1);
    assert!(parsed.get("sync_summary").is_none());
    assert_eq!(parsed["results"][0]["reference_id"], "0000000042-24-000060");
}

#[test]
fn test_ask_entity_no_sync_empty_cache_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_fctx(
        &config_path,
        &["ask", "revenue", "--entity", "42", "--no-sync"],
    );
    assert!(!success);
    assert!(stderr.contains("documents required"), "stderr: {}", stderr);
}

#[test]
fn test_manifest_missing_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_fctx(&config_path, &["manifest", "42", "--profile", "events"]);
    assert!(!success);
    assert!(stderr.contains("no manifest"), "stderr: {}", stderr);
}
