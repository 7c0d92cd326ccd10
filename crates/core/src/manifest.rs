// SPDX-License-Identifier: MIT

//! Task manifest — the input handed to a toolchain adapter.
//!
//! Written as `manifest.json` into the workcell root before the adapter
//! runs, so the agent (and the gate tooling it may invoke) can see the
//! task, the forbidden paths, and the quality-gate set.

use crate::issue::Issue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

/// Snapshot of the issue embedded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIssue {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden_paths: Vec<String>,
}

impl From<&Issue> for ManifestIssue {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            acceptance_criteria: issue.acceptance_criteria.clone().unwrap_or_default(),
            context_files: issue.context_files.clone().unwrap_or_default(),
            forbidden_paths: issue.dk_forbidden_paths.clone(),
        }
    }
}

/// The input given to an adapter for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub workcell_id: String,
    pub issue: ManifestIssue,
    pub toolchain: String,
    /// Adapter-specific configuration passthrough.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub toolchain_config: Map<String, Value>,
    /// Quality gate set, name → shell command, in configured order.
    pub quality_gates: IndexMap<String, String>,
    pub branch_name: String,
    pub speculate_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speculate_tag: Option<String>,
    /// Per-task deadline for the adapter invocation.
    pub timeout_seconds: u64,
}

impl Manifest {
    pub fn new(
        workcell_id: impl Into<String>,
        issue: &Issue,
        toolchain: impl Into<String>,
        branch_name: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            workcell_id: workcell_id.into(),
            issue: ManifestIssue::from(issue),
            toolchain: toolchain.into(),
            toolchain_config: Map::new(),
            quality_gates: IndexMap::new(),
            branch_name: branch_name.into(),
            speculate_mode: false,
            speculate_tag: None,
            timeout_seconds: 1800,
        }
    }

    crate::setters! {
        set {
            toolchain_config: Map<String, Value>,
            quality_gates: IndexMap<String, String>,
            timeout_seconds: u64,
        }
    }

    /// Mark this manifest as a speculate attempt with the given tag.
    pub fn speculate(mut self, tag: impl Into<String>) -> Self {
        self.speculate_mode = true;
        self.speculate_tag = Some(tag.into());
        self
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
