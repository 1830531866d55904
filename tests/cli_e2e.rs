//! End-to-end CLI tests for the dljob binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with an isolated config home so a developer's config file never leaks in.
fn dljob(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dljob").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("HOME", home.path())
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--target-dir"))
        .stdout(predicate::str::contains("--job"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dljob"));
}

#[test]
fn test_binary_without_source_fails() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn test_binary_rejects_out_of_range_threads() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .args(["--url", "ftp://h/pub", "--target-dir", "m", "--threads", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threads"));
}

#[test]
fn test_binary_unsupported_scheme() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .args(["--url", "http://example.org/x", "--target-dir", "mirror", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "No connector available for scheme: http",
        ));
}

#[test]
fn test_binary_missing_job_file() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .args(["--job", "nope.dljob"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load job file"));
}

#[test]
fn test_binary_invalid_config_file_fails() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("config").join("dljob");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "threads = 99\n").unwrap();

    dljob(&home)
        .args(["--url", "ftp://h/pub", "--target-dir", "m", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("threads"));
}

#[test]
fn test_binary_finished_job_exits_zero() {
    let home = TempDir::new().unwrap();
    let job_file = home.path().join("20240101000000.dljob");
    // nothing pending: the single worker's failed connect is harmless
    fs::write(
        &job_file,
        "ftp://user:pw@127.0.0.1:1/pub\nmirror\n1:/pub/a\n1:/pub/b\n",
    )
    .unwrap();

    dljob(&home)
        .args(["--job", job_file.to_str().unwrap(), "--yes", "--threads", "1"])
        .assert()
        .success();

    let saved = fs::read_to_string(&job_file).unwrap();
    assert!(saved.contains("1:/pub/a"));
    // the hand-written password is still there for the next resume
    assert!(saved.starts_with("ftp://user:pw@127.0.0.1:1/pub\n"));
}

#[test]
fn test_binary_reads_piped_password() {
    let home = TempDir::new().unwrap();
    dljob(&home)
        .args([
            "--url",
            "ftp://user@127.0.0.1:1/pub",
            "--target-dir",
            "mirror",
            "--yes",
            "--connect-timeout-secs",
            "5",
        ])
        .write_stdin("secret\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Password: "))
        .stderr(predicate::str::contains("Failed to connect"))
        .stderr(predicate::str::contains("secret").not());
}
