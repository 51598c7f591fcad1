//! CLI tests for `realms demo`, `realms config` and `realms path`.
//!
//! Spawns the realms binary and checks stdout and exit codes.

use std::fs;
use std::process::Command;

use realms::exit_codes;
use realms::io::config::{RuntimeConfig, load_config, write_config};

#[test]
fn demo_prints_json_report() {
    let output = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["demo", "--steps", "2"])
        .output()
        .expect("realms demo");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(
        report["value"],
        serde_json::json!({"count": 2, "history": [1, 2]})
    );
    assert_eq!(report["commits"].as_array().map(Vec::len), Some(2));
}

#[test]
fn demo_reads_config_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("realms.toml");
    let cfg = RuntimeConfig {
        log_filter: "realms=debug".to_string(),
        ..RuntimeConfig::default()
    };
    write_config(&path, &cfg).expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["demo", "--steps", "1", "--config"])
        .arg(&path)
        .env_remove("RUST_LOG")
        .output()
        .expect("realms demo");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn invalid_config_exits_with_invalid_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("realms.toml");
    fs::write(&path, "max_path_depth = 0\n").expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["demo", "--config"])
        .arg(&path)
        .output()
        .expect("realms demo");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_path_depth"));
}

#[test]
fn path_render_and_compare() {
    let output = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["path", "render", "app", "a/b", "0"])
        .output()
        .expect("realms path render");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "[/app/a\\/b/0]");

    let output = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["path", "compare", "--left", "a,b", "--right", "a,b,c"])
        .output()
        .expect("realms path compare");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ascendant");
}

#[test]
fn config_init_writes_defaults_and_refuses_to_overwrite() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("realms.toml");

    let status = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["config", "init", "--path"])
        .arg(&path)
        .status()
        .expect("realms config init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load"), RuntimeConfig::default());

    let status = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["config", "init", "--path"])
        .arg(&path)
        .status()
        .expect("realms config init again");
    assert_eq!(status.code(), Some(exit_codes::INVALID));

    let output = Command::new(env!("CARGO_BIN_EXE_realms"))
        .args(["config", "show", "--path"])
        .arg(&path)
        .output()
        .expect("realms config show");
    assert!(String::from_utf8_lossy(&output.stdout).contains("max_path_depth = 64"));
}
