// SPDX-License-Identifier: MIT

//! Scripted adapter for tests.

use crate::toolchain::{CostEstimate, ToolchainAdapter};
use async_trait::async_trait;
use foreman_core::{Manifest, Outcome, PatchProof};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One recorded `execute` invocation.
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub workcell_id: String,
    pub issue_id: String,
    pub workcell_path: PathBuf,
    pub speculate_tag: Option<String>,
}

struct FakeState {
    calls: Vec<FakeCall>,
    scripted: VecDeque<PatchProof>,
    healthy: bool,
    files_modified: Vec<String>,
}

/// Test adapter that returns scripted proofs and records calls.
///
/// With no scripted proofs queued it fabricates a successful proof whose
/// patch touches `files_modified` (default `src/app.rs`).
#[derive(Clone)]
pub struct FakeAdapter {
    name: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                scripted: VecDeque::new(),
                healthy: true,
                files_modified: vec!["src/app.rs".to_string()],
            })),
        }
    }

    /// Queue a proof to return from the next `execute` call.
    pub fn push_proof(&self, proof: PatchProof) {
        self.state.lock().scripted.push_back(proof);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().healthy = healthy;
    }

    /// Files the fabricated default proof reports as modified.
    pub fn set_files_modified(&self, files: Vec<String>) {
        self.state.lock().files_modified = files;
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl ToolchainAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        manifest: &Manifest,
        workcell_path: &Path,
        _timeout: Duration,
    ) -> PatchProof {
        let mut state = self.state.lock();
        state.calls.push(FakeCall {
            workcell_id: manifest.workcell_id.clone(),
            issue_id: manifest.issue.id.clone(),
            workcell_path: workcell_path.to_path_buf(),
            speculate_tag: manifest.speculate_tag.clone(),
        });

        if let Some(mut proof) = state.scripted.pop_front() {
            proof.workcell_id = manifest.workcell_id.clone();
            proof.issue_id = manifest.issue.id.clone();
            if proof.metadata.toolchain.is_empty() {
                proof.metadata.toolchain = self.name.clone();
            }
            return proof;
        }

        let mut proof = PatchProof::new(&manifest.workcell_id, &manifest.issue.id, Outcome::Success);
        proof.metadata.toolchain = self.name.clone();
        proof.metadata.duration_ms = 5;
        proof.confidence = 0.85;
        proof.patch.files_modified = state.files_modified.clone();
        proof.patch.forbidden_path_violations = foreman_core::forbidden_path_violations(
            &proof.patch.files_modified,
            &manifest.issue.forbidden_paths,
        );
        proof
    }

    async fn health_check(&self) -> bool {
        self.state.lock().healthy
    }

    fn estimate_cost(&self, _manifest: &Manifest) -> CostEstimate {
        CostEstimate {
            estimated_tokens: 10_000,
            estimated_cost_usd: 0.05,
            model: "fake".to_string(),
        }
    }
}
