// SPDX-License-Identifier: MIT

//! The toolchain adapter contract.

use async_trait::async_trait;
use foreman_core::{Manifest, PatchProof};
use std::path::Path;
use std::time::Duration;

/// Estimated cost of executing a task.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub estimated_tokens: u64,
    pub estimated_cost_usd: f64,
    pub model: String,
}

/// Uniform wrapper around an external code-generating agent.
///
/// Adapters are polymorphic over this capability set; the orchestrator
/// never inspects adapter internals.
#[async_trait]
pub trait ToolchainAdapter: Send + Sync + 'static {
    /// Adapter name, matching its key in configuration.
    fn name(&self) -> &str;

    /// Run the agent inside the workcell.
    ///
    /// Never fails: agent crashes, spawn failures, and deadline expiry are
    /// all reported through the returned proof's outcome (`error` /
    /// `timeout`), so the dispatcher can fall back.
    ///
    /// Adapters populate the proof's verification block only when they ran
    /// gates themselves; otherwise the verifier fills it in.
    async fn execute(&self, manifest: &Manifest, workcell_path: &Path, timeout: Duration)
        -> PatchProof;

    /// Cheap, bounded probe that the toolchain is operational.
    async fn health_check(&self) -> bool;

    /// Estimate tokens/cost for a task. Used by reporting only.
    fn estimate_cost(&self, manifest: &Manifest) -> CostEstimate;
}
