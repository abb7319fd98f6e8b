//! The binary against a mocked project. The binary blocks, so it runs on the
//! blocking pool while the mock server keeps serving.

use std::fs;
use std::process::{Command, Output};

use assert_cmd::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROSTER: &str = "\
version: 1
settings:
  delay_ms: 0
entries:
  - email: a@x.com
    display_name: A
    password: hunter2
    branch: HN35
    role: staff
  - email: new@x.com
    display_name: New
    password: s3cret
    branch: HN35
    role: staff
";

async fn mock_project() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{
                "id": "u-1",
                "email": "a@x.com",
                "email_confirmed_at": "2026-01-01T00:00:00Z",
                "user_metadata": {}
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.u-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "u-1",
            "full_name": "A",
            "role": "staff",
            "branch": "HN01",
            "approval_status": "pending"
        }])))
        .mount(&server)
        .await;
    server
}

async fn run_binary(server: &MockServer, args: &[&str]) -> (Output, TempDir) {
    let home = TempDir::new().expect("home");
    let roster = home.path().join("roster.yaml");
    fs::write(&roster, ROSTER).expect("write roster");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rostersync"));
    cmd.env("HOME", home.path())
        .env("SUPABASE_URL", server.uri())
        .env("SUPABASE_SERVICE_ROLE_KEY", "service-key")
        .env_remove("RUST_LOG")
        .current_dir(home.path())
        .arg("reconcile")
        .arg(&roster)
        .args(args);
    let output = tokio::task::spawn_blocking(move || cmd.output().expect("run binary"))
        .await
        .expect("blocking task");
    (output, home)
}

#[tokio::test]
async fn dry_run_json_reports_plan_and_writes_nothing() {
    let server = mock_project().await;

    let (output, _home) = run_binary(&server, &["--dry-run", "--create-missing", "--json"]).await;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["summary"]["planned"], 2);

    let entries = report["entries"].as_array().expect("entries");
    assert_eq!(entries[0]["email"], "a@x.com");
    assert_eq!(entries[0]["identity_id"], "u-1");
    assert_eq!(entries[0]["profile"]["kind"], "would_update");
    assert_eq!(
        entries[0]["profile"]["fields"],
        json!(["approval_status", "branch"])
    );
    assert_eq!(entries[1]["identity"], "would_create");

    let requests = server.received_requests().await.expect("recording");
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("hunter2"));
}

#[tokio::test]
async fn missing_identity_without_create_flag_is_reported() {
    let server = mock_project().await;

    let (output, _home) = run_binary(&server, &["--dry-run"]).await;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("identity missing"), "{stdout}");
    assert!(stdout.contains("1 missing"), "{stdout}");
}

#[tokio::test]
async fn unreachable_service_fails_entries_not_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"msg": "boom"})))
        .mount(&server)
        .await;

    let (output, _home) = run_binary(&server, &["--json"]).await;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["summary"]["failed"], 2);
    assert_eq!(report["entries"][1]["stage"], "resolve");
}
