// SPDX-License-Identifier: MIT

use super::*;
use std::process::Command as StdCommand;

/// Build a real git repo with an initial commit on `main`.
fn git_repo() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(dir.path())
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .output()
            .unwrap();
        assert!(output.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&output.stderr));
    };
    run(&["init", "-b", "main"]);
    run(&["config", "user.email", "test@test.com"]);
    run(&["config", "user.name", "Test User"]);
    std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
    std::fs::create_dir_all(dir.path().join(".foreman")).unwrap();
    std::fs::write(dir.path().join(".foreman/config.toml"), "").unwrap();
    run(&["add", "."]);
    run(&["commit", "-m", "Initial commit"]);

    let config = Config::load(dir.path()).unwrap();
    (dir, config)
}

fn now() -> DateTime<Utc> {
    "2026-08-01T12:00:00Z".parse().unwrap()
}

#[tokio::test]
async fn create_builds_isolated_worktree() {
    let (_dir, config) = git_repo();
    let manager = WorkcellManager::new(&config);

    let path = manager.create("42", None, now()).await.unwrap();

    assert!(path.is_dir());
    assert!(path.join("README.md").exists(), "worktree content missing");
    assert!(path.join("logs").is_dir());
    // Kernel state is stripped from the sandbox.
    assert!(!path.join(".foreman").exists());

    let marker = manager.marker(&path).unwrap();
    assert_eq!(marker.issue_id, "42");
    assert_eq!(marker.created, "20260801T120000Z");
    assert_ne!(marker.parent_commit, "unknown");
    assert!(marker.speculate_tag.is_none());
}

#[tokio::test]
async fn speculate_workcells_do_not_collide() {
    let (_dir, config) = git_repo();
    let manager = WorkcellManager::new(&config);

    let a = manager.create("7", Some("spec-0".to_string()), now()).await.unwrap();
    let b = manager.create("7", Some("spec-1".to_string()), now()).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(manager.marker(&a).unwrap().speculate_tag.as_deref(), Some("spec-0"));
}

#[tokio::test]
async fn list_active_requires_marker() {
    let (_dir, config) = git_repo();
    let manager = WorkcellManager::new(&config);

    assert!(manager.list_active().is_empty());
    let path = manager.create("42", None, now()).await.unwrap();
    assert_eq!(manager.list_active(), vec![path.clone()]);

    // A directory without a marker is not a workcell.
    std::fs::create_dir_all(config.workcells_dir().join("stray")).unwrap();
    assert_eq!(manager.list_active().len(), 1);
}

#[tokio::test]
async fn cleanup_removes_worktree_and_branch() {
    let (dir, config) = git_repo();
    let manager = WorkcellManager::new(&config);
    let path = manager.create("42", None, now()).await.unwrap();
    let branch = manager.marker(&path).unwrap().branch();

    manager.cleanup(&path, false).await;

    assert!(!path.exists());
    let branches = StdCommand::new("git")
        .args(["branch", "--list", &branch])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&branches.stdout).trim().is_empty(), "branch survived");
}

#[tokio::test]
async fn cleanup_with_keep_logs_archives_everything() {
    let (_dir, config) = git_repo();
    let manager = WorkcellManager::new(&config);
    let path = manager.create("42", None, now()).await.unwrap();
    let workcell_id = path.file_name().unwrap().to_string_lossy().to_string();

    std::fs::write(path.join("logs/test.log"), "gate output").unwrap();
    std::fs::create_dir_all(path.join("logs/nested")).unwrap();
    std::fs::write(path.join("logs/nested/deep.log"), "nested").unwrap();
    std::fs::write(path.join("manifest.json"), "{}").unwrap();
    std::fs::write(path.join("proof.json"), "{}").unwrap();
    std::fs::create_dir_all(path.join("renders")).unwrap();
    std::fs::write(path.join("renders/preview.png"), "png").unwrap();

    manager.cleanup(&path, true).await;

    let archive = config.archives_dir().join(&workcell_id);
    assert!(archive.join(".workcell").exists());
    assert!(archive.join("manifest.json").exists());
    assert!(archive.join("proof.json").exists());
    assert_eq!(std::fs::read_to_string(archive.join("logs/test.log")).unwrap(), "gate output");
    assert_eq!(std::fs::read_to_string(archive.join("logs/nested/deep.log")).unwrap(), "nested");
    assert!(archive.join("renders/preview.png").exists());
    assert!(!path.exists());
}

#[tokio::test]
async fn create_in_non_repo_fails_with_sandbox_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".foreman")).unwrap();
    std::fs::write(dir.path().join(".foreman/config.toml"), "").unwrap();
    let config = Config::load(dir.path()).unwrap();
    let manager = WorkcellManager::new(&config);

    let err = manager.create("42", None, now()).await.unwrap_err();
    assert!(matches!(err, SandboxError::WorktreeFailed(_)));
}
