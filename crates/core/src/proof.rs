// SPDX-License-Identifier: MIT

//! Patch+Proof — the structured output of one dispatch attempt: the change
//! made plus the evidence of correctness.

use crate::dep::DepType;
use crate::issue::{Priority, Risk};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const PROOF_SCHEMA_VERSION: &str = "1.0.0";

/// Outcome of an adapter execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failed,
    Timeout,
    Error,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failures that justify falling back to the next adapter candidate.
    pub fn is_hard_failure(self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Timeout | Outcome::Error)
    }
}

crate::display_names! {
    Outcome {
        Success => "success",
        Partial => "partial",
        Failed => "failed",
        Timeout => "timeout",
        Error => "error",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
}

/// Summary of the change an attempt produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSummary {
    #[serde(default)]
    pub parent_commit: String,
    #[serde(default)]
    pub head_commit: String,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub diff_stats: DiffStats,
    #[serde(default)]
    pub forbidden_path_violations: Vec<String>,
}

/// Per-gate check result inside the verification block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCheck {
    pub passed: bool,
    pub exit_code: i32,
    #[serde(default)]
    pub duration_ms: u64,
    /// Passed only after at least one retry.
    #[serde(default)]
    pub flaky: bool,
}

/// Verification block: per-gate results plus the aggregate flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    #[serde(default)]
    pub gates: IndexMap<String, GateCheck>,
    #[serde(default)]
    pub all_passed: bool,
    #[serde(default)]
    pub blocking_failures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProofMetadata {
    #[serde(default)]
    pub toolchain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// A new issue the attempt asks the orchestrator to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A dependency change the attempt asks the orchestrator to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMutation {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub dep_type: DepType,
}

fn default_confidence() -> f64 {
    0.5
}

/// The standardized output of one adapter execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchProof {
    pub schema_version: String,
    pub workcell_id: String,
    pub issue_id: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub patch: PatchSummary,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default)]
    pub metadata: ProofMetadata,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub risk_classification: Risk,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<FollowUp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graph_mutations: Vec<GraphMutation>,
    /// Human-readable failure detail for error/timeout proofs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PatchProof {
    pub fn new(
        workcell_id: impl Into<String>,
        issue_id: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            schema_version: PROOF_SCHEMA_VERSION.to_string(),
            workcell_id: workcell_id.into(),
            issue_id: issue_id.into(),
            outcome,
            patch: PatchSummary::default(),
            verification: Verification::default(),
            metadata: ProofMetadata::default(),
            confidence: default_confidence(),
            risk_classification: Risk::default(),
            follow_ups: Vec::new(),
            graph_mutations: Vec::new(),
            error: None,
        }
    }

    /// Proof for an adapter that crashed or could not start.
    pub fn adapter_error(
        workcell_id: impl Into<String>,
        issue_id: impl Into<String>,
        toolchain: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut proof = Self::new(workcell_id, issue_id, Outcome::Error);
        proof.metadata.toolchain = toolchain.into();
        proof.confidence = 0.0;
        proof.error = Some(message.into());
        proof
    }

    /// Proof for an adapter that exceeded the per-task deadline.
    pub fn adapter_timeout(
        workcell_id: impl Into<String>,
        issue_id: impl Into<String>,
        toolchain: impl Into<String>,
        timeout_seconds: u64,
    ) -> Self {
        let mut proof = Self::new(workcell_id, issue_id, Outcome::Timeout);
        proof.metadata.toolchain = toolchain.into();
        proof.confidence = 0.0;
        proof.error = Some(format!("Timeout after {timeout_seconds}s"));
        proof
    }
}

/// Scan a changed-file list against forbidden path patterns.
///
/// A pattern ending in `/` matches any file under that prefix; any other
/// pattern must match the path exactly. Returns the offending paths.
pub fn forbidden_path_violations(files: &[String], patterns: &[String]) -> Vec<String> {
    files
        .iter()
        .filter(|file| {
            patterns.iter().any(|pattern| {
                if pattern.ends_with('/') {
                    file.starts_with(pattern.as_str())
                } else {
                    file.as_str() == pattern.as_str()
                }
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "proof_tests.rs"]
mod tests;
