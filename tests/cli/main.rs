//! Tests for the w3c-tail binary.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn w3c_tail() -> Command {
    Command::new(env!("CARGO_BIN_EXE_w3c-tail"))
}

#[test]
fn test_help_lists_options() {
    let output = w3c_tail()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--config",
        "--path",
        "--tag",
        "--pos-file",
        "--expand-fields",
        "--read-line-limit",
    ] {
        assert!(stdout.contains(flag), "Help should mention {flag}");
    }
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("w3c-tail.toml");
    fs::write(&config, "read_line_limit = \"lots\"\n").unwrap();

    let output = w3c_tail()
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid config file"));
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();

    let output = w3c_tail()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_malformed_position_file_fails() {
    let dir = TempDir::new().unwrap();
    let pos_file = dir.path().join("iis.pos");
    fs::write(&pos_file, "not a position\n").unwrap();

    let output = w3c_tail()
        .arg("--path")
        .arg(format!("{}/*.log", dir.path().display()))
        .arg("--pos-file")
        .arg(&pos_file)
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid position entry"));
}
