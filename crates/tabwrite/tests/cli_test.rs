//! CLI tests for the tabwrite binary
//!
//! Each test writes a config and an input file to a temp directory and runs
//! the compiled binary against the in-memory backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn tabwrite() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tabwrite"))
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn run(config: &Path, input: &Path, dead_letter: Option<&Path>) -> Output {
    let mut cmd = tabwrite();
    cmd.arg("--log-level")
        .arg("warn")
        .arg("run")
        .arg("--config")
        .arg(config)
        .arg("--input")
        .arg(input)
        .arg("--json");
    if let Some(path) = dead_letter {
        cmd.arg("--dead-letter").arg(path);
    }
    cmd.output().unwrap()
}

fn summary(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "tabwrite failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

const BASE_CONFIG: &str = r#"
[metrics]
enabled = false

[write]
table = "acme:analytics.events"
schema = "user:STRING,n:INTEGER"
retry_strategy = "retry_on_transient_error"
batch_size = 2

[write.retry]
initial_delay = "1ms"
max_delay = "5ms"
"#;

#[test]
fn test_run_writes_rows() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "tabwrite.toml", BASE_CONFIG);
    let input = write_file(
        &dir,
        "rows.jsonl",
        "{\"user\": \"a\", \"n\": 1}\n{\"user\": \"b\", \"n\": 2}\n\n{\"user\": \"c\", \"n\": 3}\n",
    );

    let output = run(&config, &input, None);
    let summary = summary(&output);

    assert_eq!(summary["rows_received"], 3);
    assert_eq!(summary["rows_committed"], 3);
    assert_eq!(summary["rows_dead_lettered"], 0);
    assert_eq!(summary["committed_by_table"]["acme:analytics.events"], 3);
}

#[test]
fn test_invalid_rows_go_to_dead_letter_file() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "tabwrite.toml", BASE_CONFIG);
    let input = write_file(
        &dir,
        "rows.jsonl",
        "{\"user\": \"a\", \"n\": 1}\n{\"user\": \"b\", \"bogus\": true}\n",
    );
    let dead_letter = dir.path().join("failed.jsonl");

    let output = run(&config, &input, Some(&dead_letter));
    let summary = summary(&output);

    assert_eq!(summary["rows_committed"], 1);
    assert_eq!(summary["rows_dead_lettered"], 1);

    let failed = fs::read_to_string(&dead_letter).unwrap();
    let lines: Vec<Value> = failed
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["destination"], "acme:analytics.events");
    assert_eq!(lines[0]["reason"], "invalid");
    assert_eq!(lines[0]["row"]["bogus"], true);
}

#[test]
fn test_routes_by_row_field() {
    let dir = TempDir::new().unwrap();
    let config = write_file(
        &dir,
        "tabwrite.toml",
        r#"
[metrics]
enabled = false

[write]
table_field = "dest"
default_project = "acme"
"#,
    );
    let input = write_file(
        &dir,
        "rows.jsonl",
        "{\"dest\": \"web.clicks\"}\n{\"dest\": \"web.views\"}\n{\"dest\": \"other:web.clicks\"}\n",
    );

    let summary = summary(&run(&config, &input, None));

    let tables = &summary["committed_by_table"];
    assert_eq!(tables["acme:web.clicks"], 1);
    assert_eq!(tables["acme:web.views"], 1);
    assert_eq!(tables["other:web.clicks"], 1);
}

#[test]
fn test_bad_json_line_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "tabwrite.toml", BASE_CONFIG);
    let input = write_file(&dir, "rows.jsonl", "{\"user\": \"a\"}\n{oops\n");

    let output = run(&config, &input, None);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}

#[test]
fn test_auto_sharding_rejected_for_file_input() {
    let dir = TempDir::new().unwrap();
    let config = write_file(
        &dir,
        "tabwrite.toml",
        r#"
[write]
table = "acme:analytics.events"
with_auto_sharding = true
"#,
    );
    let input = write_file(&dir, "rows.jsonl", "{}\n");

    let output = run(&config, &input, None);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unbounded"));
}

#[test]
fn test_check_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "tabwrite.toml", BASE_CONFIG);

    let output = tabwrite().arg("check").arg("--config").arg(&config).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("configuration OK"));
    assert!(stdout.contains("acme:analytics.events"));
    assert!(stdout.contains("2 field(s)"));
}

#[test]
fn test_check_rejects_truncate() {
    let dir = TempDir::new().unwrap();
    let config = write_file(
        &dir,
        "tabwrite.toml",
        r#"
[write]
table = "acme:analytics.events"
write_disposition = "write_truncate"
"#,
    );

    let output = tabwrite().arg("check").arg("--config").arg(&config).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("write_truncate"));
}

#[test]
fn test_check_auto_sharding_needs_unbounded() {
    let dir = TempDir::new().unwrap();
    let config = write_file(
        &dir,
        "tabwrite.toml",
        r#"
[write]
table = "acme:analytics.events"
with_auto_sharding = true
"#,
    );

    let bounded = tabwrite().arg("check").arg("--config").arg(&config).output().unwrap();
    assert!(!bounded.status.success());

    let unbounded = tabwrite()
        .arg("check")
        .arg("--config")
        .arg(&config)
        .arg("--unbounded")
        .output()
        .unwrap();
    assert!(unbounded.status.success());
}
