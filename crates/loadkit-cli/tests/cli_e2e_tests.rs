//! End-to-end tests for the loadkit binary
//!
//! These tests validate:
//! - Row claims and pointer persistence across invocations
//! - Pointer inspection and reset
//! - Token fetching against a mocked endpoint
//! - Correlation of captured responses
//! - Drain runs and their stop reasons

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn pointer_dir(&self) -> PathBuf {
        self.dir.path().join("pointers")
    }

    fn loadkit(&self) -> Command {
        let mut cmd = Command::cargo_bin("loadkit").unwrap();
        cmd.env_remove("LOADKIT_RUN_ID")
            .env_remove("LOADKIT_MAX_FAILURES")
            .env_remove("LOADKIT_FAILURE_LOG")
            .env("LOADKIT_POINTER_DIR", self.pointer_dir())
            .env("LOADKIT_STOP_DELAY_MS", "0")
            .current_dir(self.dir.path());
        cmd
    }
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

fn claim(ws: &Workspace, source: &Path, extra: &[&str]) -> Value {
    let output = ws
        .loadkit()
        .arg("claim")
        .arg("--source")
        .arg(source)
        .args(["--columns", "user,password"])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success());
    stdout_json(&output.stdout)
}

// ============================================================================
// Claim Tests
// ============================================================================

#[test]
fn test_claims_advance_across_invocations() {
    let ws = Workspace::new();
    let source = ws.file("users.csv", "alice,pw1\nbob,pw2\n");

    let first = claim(&ws, &source, &[]);
    assert_eq!(first["values"]["user"], "alice");
    assert_eq!(first["index"], 0);

    let second = claim(&ws, &source, &[]);
    assert_eq!(second["values"]["password"], "pw2");
    assert_eq!(second["index"], 1);

    let third = claim(&ws, &source, &[]);
    assert_eq!(third["exhausted"], true);
}

#[test]
fn test_batch_claim_and_reset() {
    let ws = Workspace::new();
    let source = ws.file("users.csv", "a,1\nb,2\nc,3\n");

    let batch = claim(&ws, &source, &["--count", "2"]);
    assert_eq!(batch["rows"].as_array().unwrap().len(), 2);
    assert_eq!(batch["exhausted"], false);

    let rewound = claim(&ws, &source, &["--reset"]);
    assert_eq!(rewound["index"], 0);
}

#[test]
fn test_zero_count_is_rejected() {
    let ws = Workspace::new();
    let source = ws.file("users.csv", "a\n");

    ws.loadkit()
        .arg("claim")
        .arg("--source")
        .arg(&source)
        .args(["--count", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--count must be at least 1"));
}

#[test]
fn test_missing_source_fails() {
    let ws = Workspace::new();

    ws.loadkit()
        .args(["claim", "--source", "nope.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load data pool"));
}

// ============================================================================
// Pointer Tests
// ============================================================================

#[test]
fn test_pointer_show_and_reset() {
    let ws = Workspace::new();
    let source = ws.file("users.csv", "a\nb\nc\n");
    claim(&ws, &source, &["--count", "3"]);

    ws.loadkit()
        .args(["pointer", "show", "--source"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Next row:     3"))
        .stdout(predicate::str::contains("Exhausted"));

    ws.loadkit()
        .args(["pointer", "reset", "--source"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("(3 -> 0)"));

    assert_eq!(claim(&ws, &source, &[])["index"], 0);
}

#[test]
fn test_pointer_reset_missing_source_fails() {
    let ws = Workspace::new();

    ws.loadkit()
        .args(["pointer", "reset", "--source", "moved.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load data pool"));

    assert!(!ws.pointer_dir().exists());
}

// ============================================================================
// Token Tests
// ============================================================================

#[tokio::test]
async fn test_token_prints_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc123"})))
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    ws.loadkit()
        .args(["token", "--client-id", "svc", "--client-secret", "s3cret", "--endpoint"])
        .arg(format!("{}/oauth/token", server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::diff("abc123\n"));
}

#[tokio::test]
async fn test_token_rejection_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    ws.loadkit()
        .args(["token", "--client-id", "svc", "--client-secret", "bad", "--endpoint"])
        .arg(server.uri())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed for client 'svc'"));
}

// ============================================================================
// Correlate Tests
// ============================================================================

#[test]
fn test_correlate_prints_variables_and_warnings() {
    let ws = Workspace::new();
    let input = ws.file(
        "response.json",
        r#"{"data": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]}"#,
    );
    let rules = ws.file(
        "rules.json",
        r#"[
            {"target": "firstId", "field": "id", "mode": "FIRST"},
            {"target": "lastId", "field": "id", "mode": "last", "indexVar": "pick"},
            {"target": "title", "field": "title", "mode": "INDEX", "indexFrom": "pick"},
            {"target": "missing", "field": "author", "mode": "FIRST"}
        ]"#,
    );

    let output = ws
        .loadkit()
        .arg("correlate")
        .arg("--input")
        .arg(&input)
        .arg("--rules")
        .arg(&rules)
        .args(["--path", "data", "--seed", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result = stdout_json(&output.stdout);
    assert_eq!(result["variables"]["firstId"], 1);
    assert_eq!(result["variables"]["lastId"], 2);
    assert_eq!(result["variables"]["pick"], 1);
    assert_eq!(result["variables"]["title"], "b");
    assert_eq!(result["variables"]["missing"], Value::Null);
    assert_eq!(result["warnings"].as_array().unwrap().len(), 1);
}

#[test]
fn test_correlate_rejects_bad_rules() {
    let ws = Workspace::new();
    let input = ws.file("response.json", "[]");
    let rules = ws.file("rules.json", r#"[{"target": "x", "mode": "sideways"}]"#);

    ws.loadkit()
        .arg("correlate")
        .arg("--input")
        .arg(&input)
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse JSON"));
}

// ============================================================================
// Drain Tests
// ============================================================================

#[test]
fn test_drain_claims_every_row_then_stops() {
    let ws = Workspace::new();
    let rows: String = (0..25).map(|i| format!("user{}\n", i)).collect();
    let source = ws.file("users.csv", &rows);

    let output = ws
        .loadkit()
        .arg("drain")
        .arg("--source")
        .arg(&source)
        .args(["--users", "5", "--reset", "--run-id", "drain-run"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output.stdout);
    assert_eq!(report["run_id"], "drain-run");
    assert_eq!(report["claims"], 25);
    assert_eq!(report["failed_iterations"], 0);
    assert_eq!(report["stop_reason"]["kind"], "exhausted");
}

#[test]
fn test_drain_completes_an_abandoned_reset() {
    let ws = Workspace::new();
    let rows: String = (0..10).map(|i| format!("user{}\n", i)).collect();
    let source = ws.file("users.csv", &rows);
    let pointer = loadkit_core::PointerStore::new(ws.pointer_dir()).open(&source).unwrap();
    pointer.write(7).unwrap();
    std::fs::write(pointer.reset_marker("stalled-run"), "").unwrap();

    let output = ws
        .loadkit()
        .arg("drain")
        .arg("--source")
        .arg(&source)
        .args(["--users", "4", "--reset", "--run-id", "stalled-run"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output.stdout);
    assert_eq!(report["claims"], 10);
    assert_eq!(report["failed_iterations"], 0);
    assert_eq!(report["stop_reason"]["kind"], "exhausted");
}

#[test]
fn test_drain_aborts_at_failure_threshold() {
    let ws = Workspace::new();

    ws.loadkit()
        .args(["drain", "--source", "missing.csv", "--users", "2", "--max-failures", "3"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("failure_threshold"))
        .stderr(predicate::str::contains("Run aborted"));
}

#[test]
fn test_no_subcommand_shows_help() {
    Command::cargo_bin("loadkit")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
