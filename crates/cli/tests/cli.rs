use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("feed-relay");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[policy]"));
    assert!(content.contains("dry_run = true"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine\n").expect("write config");

    let mut cmd = cargo_bin_cmd!("feed-relay");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine\n");
}

#[test]
fn normalize_outputs_valid_json() {
    let dir = TempDir::new().expect("temp dir");

    let mut cmd = cargo_bin_cmd!("feed-relay");
    let output = cmd
        .current_dir(dir.path())
        .args([
            "normalize",
            "--json",
            "--text",
            "alice: \"Great day!! \u{1F60A}   @bob @carol\"",
        ])
        .output()
        .expect("run normalize");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["title"], "Great day!!");
    assert_eq!(json["empty"], false);
}

#[test]
fn normalize_can_keep_prefix() {
    let dir = TempDir::new().expect("temp dir");

    let mut cmd = cargo_bin_cmd!("feed-relay");
    cmd.current_dir(dir.path())
        .args(["normalize", "--no-strip-prefix", "--text", "Note: bring snacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Note: bring snacks"));
}

#[test]
fn ledger_mark_then_list() {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("relay.sqlite");
    let uri = "https://feed.example.com/p/abc";

    let mut mark = cargo_bin_cmd!("feed-relay");
    mark.current_dir(dir.path())
        .env("FEED_RELAY__GENERAL__STATE_DB_PATH", &db_path)
        .args(["ledger", "mark", uri])
        .assert()
        .success()
        .stdout(predicate::str::contains("Marked posted"));

    let mut again = cargo_bin_cmd!("feed-relay");
    again
        .current_dir(dir.path())
        .env("FEED_RELAY__GENERAL__STATE_DB_PATH", &db_path)
        .args(["ledger", "mark", uri])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already posted"));

    let mut list = cargo_bin_cmd!("feed-relay");
    let output = list
        .current_dir(dir.path())
        .env("FEED_RELAY__GENERAL__STATE_DB_PATH", &db_path)
        .args(["ledger", "list", "--json"])
        .output()
        .expect("run ledger list");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let entries = json.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["source_uri"], uri);
    assert_eq!(entries[0]["posted"], true);
}

#[test]
fn run_once_with_stub_adapters() {
    let dir = TempDir::new().expect("temp dir");

    let mut cmd = cargo_bin_cmd!("feed-relay");
    cmd.current_dir(dir.path())
        .env("FEED_RELAY__SOURCE__KIND", "stub")
        .env("FEED_RELAY__PUBLISH__KIND", "stub")
        .args(["run", "--once", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Listed 0"));
}
