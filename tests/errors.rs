mod common;

use std::fs;

use chrono::{Duration, Utc};
use predicates::prelude::*;
use serde_json::json;

use common::{FakeGranola, TestEnv};

#[test]
fn missing_credentials_fail() {
    let env = TestEnv::new();
    env.mkdir("GoogleDrive-me@example.com/My Drive/Loblaw");
    env.write_config("http://127.0.0.1:9", "");

    env.cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No Granola credentials found"));
    assert!(!env.lock_exists());
}

#[test]
fn expired_credentials_fail() {
    let env = TestEnv::new();
    env.write_config("http://127.0.0.1:9", "");
    let granola_dir = env.home().join(".config").join("Granola");
    fs::create_dir_all(&granola_dir).unwrap();
    let tokens = json!({
        "access_token": "old",
        "obtained_at": 1_600_000_000_000i64,
        "expires_in": 3600
    });
    fs::write(
        granola_dir.join("supabase.json"),
        json!({ "workos_tokens": tokens.to_string() }).to_string(),
    )
    .unwrap();

    env.cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("expired"));
}

#[test]
fn no_cloud_mounts_fail() {
    let env = TestEnv::new();
    env.write_config("http://127.0.0.1:9", "");

    env.cmd()
        .args(["run", "--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No output folder for project 'Loblaw'"));
    assert!(!env.state_exists());
}

fn assert_listing_failure_is_fatal(failing_path: &str) {
    let env = TestEnv::new();
    env.mkdir("GoogleDrive-me@example.com/My Drive/Loblaw");
    let doc = json!({ "id": "d1", "title": "Loblaw Weekly", "created_at": "2024-01-10T15:00:00Z" });
    let server = FakeGranola::start(json!([]), vec![doc], Default::default());
    server.fail(failing_path, 500);
    env.write_config(&server.base_url, "");

    env.cmd()
        .args(["run", "--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Granola API returned 500"));

    assert!(!env.state_exists());
    assert!(!env.lock_exists());
    assert!(!server.requests().iter().any(|p| p == "/v1/get-document-transcript"));
}

#[test]
fn folder_listing_server_error_fails() {
    assert_listing_failure_is_fatal("/v1/get-document-lists");
}

#[test]
fn document_listing_server_error_fails() {
    assert_listing_failure_is_fatal("/v2/get-documents");
}

#[test]
fn fresh_lock_exits_quietly() {
    let env = TestEnv::new();
    env.write_config("http://127.0.0.1:9", "");
    let held_since = (Utc::now() - Duration::minutes(5)).timestamp_millis();
    env.write_lock(held_since);

    env.cmd()
        .args(["run", "--token", "t"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already running"));

    assert!(env.lock_exists());
    assert_eq!(
        fs::read_to_string(env.data_dir().join("sync.lock")).unwrap(),
        held_since.to_string()
    );
    assert!(!env.state_exists());
}

#[test]
fn fresh_lock_reported_in_json() {
    let env = TestEnv::new();
    env.write_config("http://127.0.0.1:9", "");
    env.write_lock(Utc::now().timestamp_millis());

    env.cmd_json()
        .args(["run", "--token", "t"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"busy""#));
}

#[test]
fn stale_lock_is_taken_over_and_released() {
    let env = TestEnv::new();
    env.write_config("http://127.0.0.1:9", "");
    env.write_lock((Utc::now() - Duration::hours(2)).timestamp_millis());

    // Proceeds past the lock, then fails on the missing mount
    env.cmd()
        .args(["run", "--token", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No output folder"));
    assert!(!env.lock_exists());
}

#[test]
fn empty_token_override_fails() {
    let env = TestEnv::new();
    env.write_config("http://127.0.0.1:9", "");

    env.cmd()
        .args(["run", "--token", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn malformed_config_fails() {
    let env = TestEnv::new();
    fs::write(env.data_dir().join("config.toml"), "project = [").unwrap();

    env.cmd().arg("status").assert().failure();
}

#[test]
fn invalid_subcommand_shows_help() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("gransync");
    cmd.arg("nonexistent-subcommand");

    cmd.assert().failure();
}
