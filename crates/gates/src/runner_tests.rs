// SPDX-License-Identifier: MIT

use super::*;

fn runner_in(dir: &tempfile::TempDir) -> GateRunner {
    GateRunner::new(dir.path())
}

fn gate(name: &str, command: &str) -> GateSpec {
    GateSpec::new(name, command).timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn passing_gate_records_exit_zero_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let results = runner_in(&dir).run_all(&[gate("test", "echo tests pass")]).await;

    let result = &results["test"];
    assert!(result.passed);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.attempt, 1);
    assert!(result.failure_summary.is_none());

    let log = std::fs::read_to_string(dir.path().join("logs/test.log")).unwrap();
    assert!(log.contains("=== STDOUT ==="));
    assert!(log.contains("tests pass"));
    assert!(log.contains("=== STDERR ==="));
}

#[tokio::test]
async fn failing_gate_gets_summary_from_markers() {
    let dir = tempfile::tempdir().unwrap();
    let results = runner_in(&dir)
        .run_all(&[gate("test", "echo 'FAILED test_login: assertion error' >&2; exit 1")])
        .await;

    let result = &results["test"];
    assert!(!result.passed);
    assert_eq!(result.exit_code, 1);
    assert!(result.failure_summary.as_deref().unwrap().contains("FAILED test_login"));
}

#[tokio::test]
async fn gates_run_in_order_and_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let results = runner_in(&dir)
        .run_all(&[
            gate("test", "echo ok"),
            gate("typecheck", "exit 1"),
            gate("lint", "echo never runs"),
        ])
        .await;

    let names: Vec<&String> = results.keys().collect();
    assert_eq!(names, ["test", "typecheck"]);
    assert!(results["test"].passed);
    assert!(!results["typecheck"].passed);
}

#[tokio::test]
async fn flaky_gate_passes_on_retry_and_is_marked() {
    let dir = tempfile::tempdir().unwrap();
    // Fails the first run, passes once the marker file exists.
    let command = "test -f flaked || { touch flaked; echo 'transient failure' >&2; exit 1; }";
    let results = runner_in(&dir).run_all(&[gate("test", command).retries(3)]).await;

    let result = &results["test"];
    assert!(result.passed);
    assert!(result.flaky_detected);
    assert_eq!(result.attempt, 2);
}

#[tokio::test]
async fn exhausted_retries_is_a_hard_failure() {
    let dir = tempfile::tempdir().unwrap();
    let results = runner_in(&dir)
        .run_all(&[gate("test", "echo nope >&2; exit 1").retries(2), gate("lint", "echo ok")])
        .await;

    let result = &results["test"];
    assert!(!result.passed);
    assert!(!result.flaky_detected);
    assert_eq!(result.attempt, 2);
    // Fail-fast: lint never ran.
    assert!(!results.contains_key("lint"));
}

#[tokio::test]
async fn timeout_is_exit_minus_one_with_summary() {
    let dir = tempfile::tempdir().unwrap();
    let spec = GateSpec::new("slow", "sleep 30").timeout(Duration::from_millis(100));
    let results = runner_in(&dir).run_all(&[spec]).await;

    let result = &results["slow"];
    assert!(!result.passed);
    assert_eq!(result.exit_code, -1);
    assert_eq!(result.failure_summary.as_deref(), Some("Timeout after 0s"));
}

#[tokio::test]
async fn unspawnable_gate_is_a_failure_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let workcell = dir.path().join("gone");
    // cwd does not exist, so the shell cannot start.
    let results = GateRunner::new(&workcell).run_all(&[gate("test", "echo hi")]).await;
    let result = &results["test"];
    assert!(!result.passed);
    assert_eq!(result.exit_code, -1);
    assert!(result.failure_summary.is_some());
}
