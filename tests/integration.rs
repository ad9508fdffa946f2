use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docchat");
    path
}

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("docchat.toml");
    fs::write(&config_path, content).unwrap();
    (tmp, config_path)
}

fn run_docchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docchat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Like [`run_docchat`] but with every provider API token scrubbed from the
/// child's environment.
fn run_docchat_without_tokens(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docchat_binary();
    let output = Command::new(&binary)
        .env_remove("HUGGINGFACEHUB_API_TOKEN")
        .env_remove("OPENAI_API_KEY")
        .env_remove("WEAVIATE_API_KEY")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(docchat_binary())
        .arg("--help")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["ingest", "ask", "serve", "status"] {
        assert!(
            stdout.contains(command),
            "help should list `{}`, got: {}",
            command,
            stdout
        );
    }
}

#[test]
fn test_status_with_memory_index() {
    let (_tmp, config_path) = write_config(
        r#"[index]
provider = "memory"
"#,
    );

    let (stdout, stderr, success) = run_docchat(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("memory"));
    assert!(stdout.contains("index status: ready"));
}

#[test]
fn test_status_reports_configured_models() {
    let (_tmp, config_path) = write_config(
        r#"[embedding]
model = "sentence-transformers/all-MiniLM-L6-v2"

[index]
provider = "memory"
"#,
    );

    let (stdout, _, success) = run_docchat(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("sentence-transformers/all-MiniLM-L6-v2"));
    assert!(stdout.contains("mistralai/Mistral-7B-Instruct-v0.2"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("does-not-exist.toml");

    // `--help` style parse still works, and status runs on pure defaults.
    let (stdout, stderr, success) = run_docchat(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("sentence-transformers/all-mpnet-base-v2"));
    assert!(stdout.contains("weaviate"));
}

#[test]
fn test_invalid_overlap_rejected() {
    let (_tmp, config_path) = write_config(
        r#"[chunking]
chunk_size = 100
chunk_overlap = 100
"#,
    );

    let (_, stderr, success) = run_docchat(&config_path, &["status"]);
    assert!(!success, "oversized overlap should fail validation");
    assert!(
        stderr.contains("chunk_overlap"),
        "should mention chunk_overlap, got: {}",
        stderr
    );
}

#[test]
fn test_unknown_embedding_provider_rejected() {
    let (_tmp, config_path) = write_config(
        r#"[embedding]
provider = "psychic"
"#,
    );

    let (_, stderr, success) = run_docchat(&config_path, &["status"]);
    assert!(!success);
    assert!(
        stderr.contains("Unknown embedding provider"),
        "got: {}",
        stderr
    );
}

#[test]
fn test_unsupported_search_type_rejected() {
    let (_tmp, config_path) = write_config(
        r#"[chat]
search_type = "mmr"
"#,
    );

    let (_, stderr, success) = run_docchat(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("search_type"), "got: {}", stderr);
}

#[test]
fn test_ask_requires_api_token() {
    let (_tmp, config_path) = write_config(
        r#"[index]
provider = "memory"
"#,
    );

    let (_, stderr, success) =
        run_docchat_without_tokens(&config_path, &["ask", "What is this about?"]);
    assert!(!success, "ask without a token should fail at startup");
    assert!(
        stderr.contains("HUGGINGFACEHUB_API_TOKEN"),
        "should name the missing variable, got: {}",
        stderr
    );
}

#[test]
fn test_ask_rejects_blank_question() {
    let (_tmp, config_path) = write_config(
        r#"[index]
provider = "memory"
"#,
    );

    // A fake token satisfies construction; the blank question is rejected
    // before any request is made.
    let output = Command::new(docchat_binary())
        .env("HUGGINGFACEHUB_API_TOKEN", "test-token")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["ask", "   "])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(
        stderr.contains("must not be empty"),
        "got: {}",
        stderr
    );
}

#[test]
fn test_ingest_without_tokens_fails_unless_dry_run() {
    let (tmp, config_path) = write_config(
        r#"[index]
provider = "memory"
"#,
    );
    let pdf_path = tmp.path().join("junk.pdf");
    fs::write(&pdf_path, b"%PDF-1.4 truncated").unwrap();

    let (_, stderr, success) =
        run_docchat_without_tokens(&config_path, &["ingest", pdf_path.to_str().unwrap()]);
    assert!(!success, "real ingest needs an embedding token");
    assert!(
        stderr.contains("HUGGINGFACEHUB_API_TOKEN"),
        "got: {}",
        stderr
    );
}

#[test]
fn test_ingest_dry_run_rejects_non_pdf() {
    let (tmp, config_path) = write_config(
        r#"[index]
provider = "memory"
"#,
    );
    let not_pdf = tmp.path().join("notes.pdf");
    fs::write(&not_pdf, b"just some text").unwrap();

    let (_, stderr, success) = run_docchat_without_tokens(
        &config_path,
        &["ingest", not_pdf.to_str().unwrap(), "--dry-run"],
    );
    assert!(!success, "non-PDF bytes should be rejected");
    assert!(stderr.contains("is not a PDF"), "got: {}", stderr);
}
