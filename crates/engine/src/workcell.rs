// SPDX-License-Identifier: MIT

//! Workcell manager: isolated git-worktree sandboxes, one per attempt.
//!
//! Creation forks a worktree off the baseline branch head, strips the
//! kernel-owned directories so the agent cannot see orchestrator state,
//! and drops an isolation marker. Cleanup archives what matters and
//! removes the worktree plus its branch.

use chrono::{DateTime, Utc};
use foreman_adapters::subprocess::{self, SubprocessError, GIT_QUERY_TIMEOUT, GIT_WORKTREE_TIMEOUT};
use foreman_config::Config;
use foreman_core::{WorkcellMarker, WorkcellName, MANIFEST_FILE, MARKER_FILE, PROOF_FILE, WORKCELL_LOGS_DIR};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Baseline branch workcells fork from.
const BASELINE_BRANCH: &str = "main";

/// Artifact directories preserved alongside logs when archiving.
const ARTIFACT_DIRS: [&str; 3] = ["renders", "output", "assets"];

/// Errors from workcell lifecycle operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to create worktree: {0}")]
    WorktreeFailed(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("marker serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Creates, inspects, archives and destroys isolated sandboxes.
pub struct WorkcellManager {
    repo_root: PathBuf,
    workcells_dir: PathBuf,
    archives_dir: PathBuf,
}

impl WorkcellManager {
    pub fn new(config: &Config) -> Self {
        Self {
            repo_root: config.repo_root.clone(),
            workcells_dir: config.workcells_dir(),
            archives_dir: config.archives_dir(),
        }
    }

    /// Create an isolated workcell for one attempt. Returns its path.
    pub async fn create(
        &self,
        issue_id: &str,
        speculate_tag: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, SandboxError> {
        let name = WorkcellName::new(issue_id, speculate_tag, now);
        let workcell_path = self.workcells_dir.join(name.id());
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SandboxError::Io { path, source }
        };

        tracing::info!(workcell_id = %name.id(), issue_id, "creating workcell");

        std::fs::create_dir_all(&self.workcells_dir).map_err(io_err(&self.workcells_dir))?;

        let parent_commit = self.baseline_head().await;

        let mut cmd = Command::new("git");
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "worktree",
            "add",
            "-b",
            &name.branch(),
            &workcell_path.display().to_string(),
            BASELINE_BRANCH,
        ])
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");
        let output = subprocess::run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SandboxError::WorktreeFailed(stderr.trim().to_string()));
        }

        // The agent must not see or mutate orchestrator state.
        for dir in [".foreman", ".workcells"] {
            let owned = workcell_path.join(dir);
            if owned.exists() {
                if let Err(e) = std::fs::remove_dir_all(&owned) {
                    tracing::warn!(path = %owned.display(), error = %e, "failed to strip kernel dir");
                }
            }
        }

        let logs_dir = workcell_path.join(WORKCELL_LOGS_DIR);
        std::fs::create_dir_all(&logs_dir).map_err(io_err(&logs_dir))?;

        let marker = WorkcellMarker::new(&name, parent_commit);
        let marker_path = workcell_path.join(MARKER_FILE);
        std::fs::write(&marker_path, serde_json::to_string_pretty(&marker)?)
            .map_err(io_err(&marker_path))?;

        tracing::info!(workcell_id = %name.id(), path = %workcell_path.display(), "workcell created");
        Ok(workcell_path)
    }

    /// Safely remove a workcell, optionally archiving logs and artifacts
    /// first. Individual failures log and continue.
    pub async fn cleanup(&self, workcell_path: &Path, keep_logs: bool) {
        let workcell_id = workcell_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        tracing::info!(%workcell_id, keep_logs, "cleaning up workcell");

        if keep_logs {
            self.archive(workcell_path);
        }

        let branch = self.marker(workcell_path).map(|m| m.branch());

        let mut cmd = Command::new("git");
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "worktree",
            "remove",
            "--force",
            &workcell_path.display().to_string(),
        ])
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");
        match subprocess::run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove").await {
            Ok(output) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(%workcell_id, error = %stderr.trim(), "failed to remove worktree");
            }
            Err(e) => tracing::warn!(%workcell_id, error = %e, "failed to remove worktree"),
            Ok(_) => {}
        }

        // Branches may be unmerged; deletion is best-effort.
        if let Some(branch) = branch {
            let mut cmd = Command::new("git");
            cmd.args(["-C", &self.repo_root.display().to_string(), "branch", "-D", &branch])
                .env_remove("GIT_DIR")
                .env_remove("GIT_WORK_TREE");
            let _ = subprocess::run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git branch delete").await;
        }

        // Remove remnants the worktree removal may have left behind.
        if workcell_path.exists() {
            if let Err(e) = std::fs::remove_dir_all(workcell_path) {
                tracing::warn!(path = %workcell_path.display(), error = %e, "failed to remove workcell dir");
            }
        }

        tracing::info!(%workcell_id, "workcell cleaned up");
    }

    /// Workcells whose isolation marker is present.
    pub fn list_active(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.workcells_dir) else {
            return Vec::new();
        };
        let mut active: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join(MARKER_FILE).exists())
            .collect();
        active.sort();
        active
    }

    /// Read a workcell's isolation marker.
    pub fn marker(&self, workcell_path: &Path) -> Option<WorkcellMarker> {
        let raw = std::fs::read_to_string(workcell_path.join(MARKER_FILE)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Archive logs, marker, manifest, proof, and produced artifact
    /// directories into `archives/<workcell-id>/`, preserving structure.
    /// Existing destinations are replaced, so re-archiving is idempotent.
    fn archive(&self, workcell_path: &Path) {
        let Some(workcell_id) = workcell_path.file_name() else { return };
        let archive_path = self.archives_dir.join(workcell_id);
        if let Err(e) = std::fs::create_dir_all(&archive_path) {
            tracing::warn!(error = %e, "failed to create archive dir");
            return;
        }

        let logs_path = workcell_path.join(WORKCELL_LOGS_DIR);
        if logs_path.exists() {
            let dest = archive_path.join(WORKCELL_LOGS_DIR);
            if dest.exists() {
                let _ = std::fs::remove_dir_all(&dest);
            }
            if let Err(e) = copy_dir_recursive(&logs_path, &dest) {
                tracing::warn!(error = %e, "failed to archive logs");
            }
        }

        for file in [PROOF_FILE, MANIFEST_FILE, MARKER_FILE] {
            let src = workcell_path.join(file);
            if src.exists() {
                if let Err(e) = std::fs::copy(&src, archive_path.join(file)) {
                    tracing::warn!(file, error = %e, "failed to archive file");
                }
            }
        }

        for dir in ARTIFACT_DIRS {
            let src = workcell_path.join(dir);
            if src.is_dir() {
                let dest = archive_path.join(dir);
                if dest.exists() {
                    let _ = std::fs::remove_dir_all(&dest);
                }
                if let Err(e) = copy_dir_recursive(&src, &dest) {
                    tracing::warn!(dir, error = %e, "failed to archive artifacts");
                }
            }
        }

        tracing::info!(archive = %archive_path.display(), "workcell archived");
    }

    async fn baseline_head(&self) -> String {
        let mut cmd = Command::new("git");
        cmd.args(["-C", &self.repo_root.display().to_string(), "rev-parse", BASELINE_BRANCH])
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        match subprocess::run_with_timeout(cmd, GIT_QUERY_TIMEOUT, "git rev-parse").await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            _ => "unknown".to_string(),
        }
    }

    pub fn archives_dir(&self) -> &Path {
        &self.archives_dir
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "workcell_tests.rs"]
mod tests;
