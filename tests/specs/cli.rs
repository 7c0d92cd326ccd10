// SPDX-License-Identifier: MIT

//! CLI surface specs driving the `foreman` binary.

use assert_cmd::Command;
use serial_test::serial;

fn foreman() -> Command {
    Command::cargo_bin("foreman").unwrap()
}

#[test]
fn help_lists_subcommands() {
    let output = foreman().arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["init", "run", "status", "workcells", "history", "stats", "escalate", "cleanup"]
    {
        assert!(help.contains(subcommand), "help missing {subcommand}");
    }
}

#[test]
#[serial]
fn init_creates_layout_and_status_reads_it() {
    let dir = tempfile::tempdir().unwrap();

    let output = foreman().arg("--repo").arg(dir.path()).arg("init").output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join(".foreman/config.toml").exists());
    assert!(dir.path().join(".workcells/.gitignore").exists());

    let output = foreman()
        .arg("--repo")
        .arg(dir.path())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let status: serde_json::Value =
        serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["issues"]["total"], 0);
    assert_eq!(status["active_workcells"], 0);
}

#[test]
#[serial]
fn malformed_config_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".foreman")).unwrap();
    std::fs::write(dir.path().join(".foreman/config.toml"), "not [valid toml").unwrap();

    let output = foreman().arg("--repo").arg(dir.path()).arg("stats").output().unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
#[serial]
fn stats_on_empty_repo_reports_zeroes() {
    let dir = tempfile::tempdir().unwrap();
    foreman().arg("--repo").arg(dir.path()).arg("init").output().unwrap();

    let output = foreman().arg("--repo").arg(dir.path()).arg("stats").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total events:     0"));
}
