// SPDX-License-Identifier: MIT

//! Generic subprocess adapter.
//!
//! Invokes a configured CLI agent with a prompt assembled from the
//! manifest, captures its output under `logs/`, and produces a
//! Patch+Proof. If the agent wrote its own `proof.json` into the workcell
//! that proof is used; otherwise one is synthesized from the git state of
//! the workcell.

use crate::subprocess::{self, GIT_QUERY_TIMEOUT, HEALTH_CHECK_TIMEOUT};
use crate::toolchain::{CostEstimate, ToolchainAdapter};
use async_trait::async_trait;
use foreman_config::ToolchainConfig;
use foreman_core::{
    forbidden_path_violations, DiffStats, Manifest, Outcome, PatchProof, PatchSummary,
    WorkcellMarker, MARKER_FILE, PROOF_FILE, WORKCELL_LOGS_DIR,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;

pub struct CliAdapter {
    name: String,
    config: ToolchainConfig,
}

impl CliAdapter {
    pub fn new(name: impl Into<String>, config: ToolchainConfig) -> Self {
        Self { name: name.into(), config }
    }

    /// Assemble the agent prompt from the manifest.
    fn build_prompt(&self, manifest: &Manifest) -> String {
        let issue = &manifest.issue;
        let mut parts = vec![format!("# Task: {}", issue.title), String::new()];

        parts.push("## Description".to_string());
        parts.push(
            issue.description.clone().unwrap_or_else(|| "No description provided.".to_string()),
        );
        parts.push(String::new());

        if !issue.acceptance_criteria.is_empty() {
            parts.push("## Acceptance Criteria".to_string());
            for criterion in &issue.acceptance_criteria {
                parts.push(format!("- {criterion}"));
            }
            parts.push(String::new());
        }

        if !issue.forbidden_paths.is_empty() {
            parts.push("## Forbidden Paths (DO NOT MODIFY)".to_string());
            for path in &issue.forbidden_paths {
                parts.push(format!("- {path}"));
            }
            parts.push(String::new());
        }

        if !issue.context_files.is_empty() {
            parts.push("## Relevant Files".to_string());
            for path in &issue.context_files {
                parts.push(format!("- {path}"));
            }
            parts.push(String::new());
        }

        if !manifest.quality_gates.is_empty() {
            parts.push("## Quality Gates (must all pass)".to_string());
            for (name, command) in &manifest.quality_gates {
                parts.push(format!("- {name}: `{command}`"));
            }
            parts.push(String::new());
        }

        parts.join("\n")
    }

    fn write_log(&self, workcell_path: &Path, suffix: &str, contents: &[u8]) {
        let path = workcell_path.join(WORKCELL_LOGS_DIR).join(format!("{}-{suffix}.log", self.name));
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, contents) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write adapter log");
        }
    }

    /// Prefer a proof the agent wrote itself; normalize its identifiers.
    fn read_agent_proof(&self, manifest: &Manifest, workcell_path: &Path) -> Option<PatchProof> {
        let raw = std::fs::read_to_string(workcell_path.join(PROOF_FILE)).ok()?;
        match serde_json::from_str::<PatchProof>(&raw) {
            Ok(mut proof) => {
                proof.workcell_id = manifest.workcell_id.clone();
                proof.issue_id = manifest.issue.id.clone();
                proof.metadata.toolchain = self.name.clone();
                Some(proof)
            }
            Err(e) => {
                tracing::warn!(toolchain = %self.name, error = %e, "agent proof.json unreadable, synthesizing");
                None
            }
        }
    }
}

#[async_trait]
impl ToolchainAdapter for CliAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        manifest: &Manifest,
        workcell_path: &Path,
        timeout: Duration,
    ) -> PatchProof {
        let started = Instant::now();
        let prompt = self.build_prompt(manifest);
        self.write_log(workcell_path, "prompt", prompt.as_bytes());

        let mut cmd = Command::new(self.config.executable(&self.name));
        cmd.arg(&prompt).current_dir(workcell_path);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let label = format!("{} agent", self.name);
        let output = match subprocess::run_with_timeout(cmd, timeout, &label).await {
            Ok(output) => output,
            Err(e) if e.is_timeout() => {
                return PatchProof::adapter_timeout(
                    &manifest.workcell_id,
                    &manifest.issue.id,
                    &self.name,
                    timeout.as_secs(),
                );
            }
            Err(e) => {
                return PatchProof::adapter_error(
                    &manifest.workcell_id,
                    &manifest.issue.id,
                    &self.name,
                    e.to_string(),
                );
            }
        };

        self.write_log(workcell_path, "stdout", &output.stdout);
        self.write_log(workcell_path, "stderr", &output.stderr);

        let duration_ms = started.elapsed().as_millis() as u64;
        let mut proof = match self.read_agent_proof(manifest, workcell_path) {
            Some(proof) => proof,
            None => {
                let outcome = if output.status.success() { Outcome::Success } else { Outcome::Failed };
                let mut proof =
                    PatchProof::new(&manifest.workcell_id, &manifest.issue.id, outcome);
                proof.patch = git_patch_summary(workcell_path).await;
                if !output.status.success() {
                    proof.error = Some(format!(
                        "agent exited with {}",
                        output.status.code().unwrap_or(-1)
                    ));
                }
                proof
            }
        };

        proof.metadata.toolchain = self.name.clone();
        proof.metadata.model = self.config.model.clone();
        proof.metadata.duration_ms = duration_ms;
        proof.patch.forbidden_path_violations = forbidden_path_violations(
            &proof.patch.files_modified,
            &manifest.issue.forbidden_paths,
        );
        proof
    }

    async fn health_check(&self) -> bool {
        let mut cmd = Command::new(self.config.executable(&self.name));
        cmd.arg("--version");
        match subprocess::run_with_timeout(cmd, HEALTH_CHECK_TIMEOUT, "health check").await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    fn estimate_cost(&self, manifest: &Manifest) -> CostEstimate {
        // Rough: a fixed floor plus the prompt-side text, capped by the
        // configured ceiling.
        let text_len = manifest.issue.description.as_deref().map_or(0, str::len)
            + manifest.issue.title.len();
        let estimated_tokens = (20_000 + text_len as u64 * 4).min(self.config.max_tokens);
        CostEstimate {
            estimated_tokens,
            estimated_cost_usd: estimated_tokens as f64 / 1_000_000.0 * 5.0,
            model: self.config.model.clone().unwrap_or_else(|| "default".to_string()),
        }
    }
}

/// Derive a patch summary from the git state of a workcell.
///
/// Agents are not required to commit; uncommitted modifications are
/// included alongside commits made on top of the marker's parent commit.
async fn git_patch_summary(workcell_path: &Path) -> PatchSummary {
    let mut summary = PatchSummary::default();

    if let Ok(raw) = std::fs::read_to_string(workcell_path.join(MARKER_FILE)) {
        if let Ok(marker) = serde_json::from_str::<WorkcellMarker>(&raw) {
            summary.parent_commit = marker.parent_commit;
        }
    }

    if let Some(head) = git_line(workcell_path, &["rev-parse", "HEAD"]).await {
        summary.head_commit = head;
    }

    let base =
        if summary.parent_commit.is_empty() { "HEAD" } else { summary.parent_commit.as_str() };

    // Committed changes relative to the fork point
    if let Some(names) = git_output(workcell_path, &["diff", "--name-only", base]).await {
        summary.files_modified.extend(names.lines().map(str::to_string));
    }
    // Uncommitted additions not yet tracked
    if let Some(names) =
        git_output(workcell_path, &["ls-files", "--others", "--exclude-standard"]).await
    {
        for name in names.lines() {
            if !summary.files_modified.iter().any(|f| f == name) {
                summary.files_modified.push(name.to_string());
            }
        }
    }

    if let Some(stat) = git_output(workcell_path, &["diff", "--shortstat", base]).await {
        summary.diff_stats = parse_shortstat(&stat);
    }

    summary
}

async fn git_output(cwd: &Path, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(cwd).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    let output = subprocess::run_with_timeout(cmd, GIT_QUERY_TIMEOUT, "git query").await.ok()?;
    output.status.success().then(|| String::from_utf8_lossy(&output.stdout).to_string())
}

async fn git_line(cwd: &Path, args: &[&str]) -> Option<String> {
    let out = git_output(cwd, args).await?;
    let line = out.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Parse `git diff --shortstat` output, e.g.
/// ` 2 files changed, 50 insertions(+), 10 deletions(-)`.
fn parse_shortstat(stat: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    for part in stat.trim().split(',') {
        let part = part.trim();
        let Some(number) = part.split_whitespace().next().and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        if part.contains("file") {
            stats.files_changed = number;
        } else if part.contains("insertion") {
            stats.insertions = number;
        } else if part.contains("deletion") {
            stats.deletions = number;
        }
    }
    stats
}

#[cfg(test)]
#[path = "cli_adapter_tests.rs"]
mod tests;
