//! CLI surface smoke checks.

#![allow(missing_docs)]

use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("nugs")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    for expected in ["update", "analyze", "fill", "watch", "upload", "status"] {
        assert!(stdout.contains(expected), "missing subcommand {expected}");
    }
}

#[test]
fn watch_help_lists_management_verbs() {
    let output = Command::cargo_bin("nugs")
        .unwrap()
        .args(["watch", "--help"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    for expected in ["add", "remove", "list", "check", "daemon"] {
        assert!(stdout.contains(expected), "missing watch verb {expected}");
    }
}

#[test]
fn unknown_flags_fail() {
    Command::cargo_bin("nugs")
        .unwrap()
        .args(["update", "--definitely-not-a-flag"])
        .assert()
        .failure();
}
