use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn help_lists_subcommands() {
    let bin = assert_cmd::cargo::cargo_bin!("imgur-sweep");
    let mut cmd = Command::new(bin);
    let assert = cmd.arg("--help").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    for sub in ["run", "login", "setup"] {
        assert!(stdout.contains(sub), "help should mention `{sub}`");
    }
}

#[test]
fn version_prints_package_version() {
    let bin = assert_cmd::cargo::cargo_bin!("imgur-sweep");
    let mut cmd = Command::new(bin);
    let assert = cmd.arg("--version").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn yes_run_fails_cleanly_without_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bin = assert_cmd::cargo::cargo_bin!("imgur-sweep");
    let mut cmd = Command::new(bin);
    cmd.current_dir(dir.path())
        .args(["run", "--yes"])
        .assert()
        .failure();
}

#[test]
fn zero_max_items_is_rejected() {
    let bin = assert_cmd::cargo::cargo_bin!("imgur-sweep");
    let mut cmd = Command::new(bin);
    let assert = cmd
        .args(["run", "--yes", "--max-items", "0"])
        .assert()
        .failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 output");
    assert!(stderr.contains("invalid value"));
}
