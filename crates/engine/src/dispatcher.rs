// SPDX-License-Identifier: MIT

//! Dispatcher: drives one issue through one attempt (or several, for
//! speculate) — workcell creation, manifest, adapter invocation,
//! forbidden-path enforcement, verification, and graph recording.

use crate::router::Router;
use crate::verifier::Verifier;
use crate::workcell::WorkcellManager;
use foreman_adapters::{AdapterRegistry, NotifyAdapter, ToolchainAdapter};
use foreman_config::Config;
use foreman_core::{
    forbidden_path_violations, Clock, Event, EventType, Issue, IssueStatus, Manifest, Outcome,
    PatchProof, Risk, MANIFEST_FILE, PROOF_FILE,
};
use foreman_storage::{NewIssue, StateManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Escalation reason recorded when a patch touches a forbidden path.
const FORBIDDEN_PATH_REASON: &str = "forbidden_path_violation";
/// Escalation reason recorded when the attempt budget runs out.
const ATTEMPTS_REASON: &str = "max_attempts_exhausted";

/// Outcome of one dispatch invocation.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub issue_id: String,
    pub success: bool,
    pub toolchain: Option<String>,
    pub workcell_id: Option<String>,
    pub proof: Option<PatchProof>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// What one attempt chain concluded, before graph recording.
enum AttemptOutcome {
    Accepted { proof: Box<PatchProof> },
    ForbiddenPaths { proof: Box<PatchProof>, violations: Vec<String> },
    Failed { error: String, proof: Option<Box<PatchProof>> },
}

/// Drives issues through workcell lifecycles.
pub struct Dispatcher<C: Clock, N: NotifyAdapter> {
    config: Arc<Config>,
    state: Arc<StateManager<C>>,
    registry: Arc<AdapterRegistry>,
    workcells: Arc<WorkcellManager>,
    verifier: Verifier,
    notifier: N,
    clock: C,
}

impl<C: Clock, N: NotifyAdapter> Dispatcher<C, N> {
    pub fn new(
        config: Arc<Config>,
        state: Arc<StateManager<C>>,
        registry: Arc<AdapterRegistry>,
        workcells: Arc<WorkcellManager>,
        verifier: Verifier,
        notifier: N,
        clock: C,
    ) -> Self {
        Self { config, state, registry, workcells, verifier, notifier, clock }
    }

    /// Dispatch one issue through one attempt. Never panics or errors:
    /// every failure mode is folded into the returned result and the
    /// graph/event record.
    pub async fn dispatch(&self, issue: &Issue, speculate: bool) -> DispatchResult {
        let started = Instant::now();
        let events = self.state.events().clone();

        if let Err(e) = self.state.update_issue_status(&issue.id, IssueStatus::Running) {
            tracing::warn!(issue_id = %issue.id, error = %e, "could not mark issue running");
        }
        events.emit(
            &Event::new(EventType::IssueStarted, self.clock.now())
                .issue_id(issue.id.clone())
                .datum("speculate", speculate),
        );

        let outcome = if speculate {
            self.dispatch_speculate(issue).await
        } else {
            self.dispatch_single(issue).await
        };

        self.record(issue, outcome, started).await
    }

    /// Fold an attempt outcome into the graph, events, and result.
    async fn record(
        &self,
        issue: &Issue,
        outcome: AttemptOutcome,
        started: Instant,
    ) -> DispatchResult {
        let events = self.state.events().clone();
        let duration_ms = started.elapsed().as_millis() as u64;
        let attempts = match self.state.increment_attempts(&issue.id) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(issue_id = %issue.id, error = %e, "could not record attempt");
                issue.dk_attempts + 1
            }
        };

        match outcome {
            AttemptOutcome::Accepted { proof } => {
                if let Err(e) = self.state.update_issue_status(&issue.id, IssueStatus::Done) {
                    tracing::warn!(issue_id = %issue.id, error = %e, "could not mark issue done");
                }
                self.apply_proof_requests(&issue.id, &proof);
                events.emit(
                    &Event::new(EventType::IssueCompleted, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(proof.workcell_id.clone())
                        .datum("toolchain", proof.metadata.toolchain.clone())
                        .duration_ms(duration_ms)
                        .tokens_used(proof.metadata.tokens_used.unwrap_or(0))
                        .cost_usd(proof.metadata.cost_usd.unwrap_or(0.0)),
                );
                DispatchResult {
                    issue_id: issue.id.clone(),
                    success: true,
                    toolchain: Some(proof.metadata.toolchain.clone()),
                    workcell_id: Some(proof.workcell_id.clone()),
                    duration_ms,
                    error: None,
                    proof: Some(*proof),
                }
            }

            AttemptOutcome::ForbiddenPaths { proof, violations } => {
                // Never accepted, regardless of gate results.
                self.escalate(&issue.id, FORBIDDEN_PATH_REASON, &violations.join(", ")).await;
                DispatchResult {
                    issue_id: issue.id.clone(),
                    success: false,
                    toolchain: Some(proof.metadata.toolchain.clone()),
                    workcell_id: Some(proof.workcell_id.clone()),
                    duration_ms,
                    error: Some(FORBIDDEN_PATH_REASON.to_string()),
                    proof: Some(*proof),
                }
            }

            AttemptOutcome::Failed { error, proof } => {
                events.emit(
                    &Event::new(EventType::IssueFailed, self.clock.now())
                        .issue_id(issue.id.clone())
                        .datum("error", error.clone())
                        .datum("attempt", attempts),
                );
                if attempts < issue.dk_max_attempts {
                    if let Err(e) = self.state.update_issue_status(&issue.id, IssueStatus::Ready) {
                        tracing::warn!(issue_id = %issue.id, error = %e, "could not re-queue issue");
                    }
                } else {
                    self.escalate(&issue.id, ATTEMPTS_REASON, &error).await;
                }
                DispatchResult {
                    issue_id: issue.id.clone(),
                    success: false,
                    toolchain: proof.as_ref().map(|p| p.metadata.toolchain.clone()),
                    workcell_id: proof.as_ref().map(|p| p.workcell_id.clone()),
                    duration_ms,
                    error: Some(error),
                    proof: proof.map(|p| *p),
                }
            }
        }
    }

    async fn escalate(&self, issue_id: &str, reason: &str, detail: &str) {
        if let Err(e) = self.state.update_issue_status(issue_id, IssueStatus::Escalated) {
            tracing::warn!(issue_id, error = %e, "could not escalate issue");
        }
        self.state.events().emit(
            &Event::new(EventType::IssueEscalated, self.clock.now())
                .issue_id(issue_id)
                .datum("reason", reason)
                .datum("detail", detail),
        );
        let _ = self.notifier.escalation(issue_id, reason, detail).await;
    }

    /// Create issues and dependency edges the proof asked for.
    fn apply_proof_requests(&self, issue_id: &str, proof: &PatchProof) {
        for follow_up in &proof.follow_ups {
            let new_issue = NewIssue::new(follow_up.title.clone())
                .priority(follow_up.priority)
                .tags(follow_up.tags.clone());
            let new_issue = match &follow_up.description {
                Some(description) => new_issue.description(description.clone()),
                None => new_issue,
            };
            match self.state.create_issue(new_issue.parent(issue_id)) {
                Ok(id) => tracing::info!(issue_id, follow_up = %id, "created follow-up issue"),
                Err(e) => tracing::warn!(issue_id, error = %e, "failed to create follow-up"),
            }
        }
        for mutation in &proof.graph_mutations {
            match self.state.add_dep(&mutation.from, &mutation.to, mutation.dep_type) {
                Ok(_) => {}
                Err(e) => tracing::warn!(issue_id, error = %e, "failed to apply graph mutation"),
            }
        }
    }

    // -- single dispatch --

    async fn dispatch_single(&self, issue: &Issue) -> AttemptOutcome {
        let router = Router::new(&self.config);
        let available = self.probe_available().await;
        let candidates: Vec<String> = router
            .ordered_candidates(issue)
            .into_iter()
            .filter(|name| self.registry.contains(name))
            .collect();

        if candidates.is_empty() {
            return AttemptOutcome::Failed {
                error: "no toolchain candidates configured".to_string(),
                proof: None,
            };
        }

        // Fallback chain is bounded by the remaining attempt budget.
        let budget = issue.attempts_remaining().max(1) as usize;
        let mut tried = 0;
        let mut last: Option<AttemptOutcome> = None;

        for toolchain in candidates {
            if tried >= budget {
                break;
            }
            if !available.contains(&toolchain) {
                tracing::debug!(issue_id = %issue.id, %toolchain, "skipping unavailable toolchain");
                continue;
            }
            let Some(adapter) = self.registry.get(&toolchain) else { continue };
            tried += 1;

            let outcome = match self.run_attempt(issue, adapter, None).await {
                Ok(outcome) => outcome,
                // SandboxError aborts the dispatch; the attempt still counts.
                Err(e) => {
                    return AttemptOutcome::Failed { error: format!("sandbox: {e}"), proof: None }
                }
            };

            // Hard adapter failure: try the next candidate.
            let hard_failure = matches!(
                &outcome,
                AttemptOutcome::Failed { proof: Some(p), .. } if p.outcome.is_hard_failure()
            );
            if hard_failure {
                last = Some(outcome);
                continue;
            }
            return outcome;
        }

        last.unwrap_or(AttemptOutcome::Failed {
            error: "no toolchain available".to_string(),
            proof: None,
        })
    }

    /// One adapter attempt in one fresh workcell: create, manifest,
    /// execute, enforce forbidden paths, verify, persist proof, archive.
    async fn run_attempt(
        &self,
        issue: &Issue,
        adapter: Arc<dyn ToolchainAdapter>,
        speculate_tag: Option<String>,
    ) -> Result<AttemptOutcome, crate::workcell::SandboxError> {
        let toolchain = adapter.name().to_string();
        let workcell_path =
            self.workcells.create(&issue.id, speculate_tag.clone(), self.clock.now()).await?;
        let workcell_id = workcell_name(&workcell_path);

        let manifest = self.build_manifest(issue, &workcell_id, &toolchain, speculate_tag);
        self.write_manifest(&workcell_path, &manifest)?;
        self.emit_workcell_started(&issue.id, &workcell_id, &toolchain);

        let timeout = Duration::from_secs(manifest.timeout_seconds);
        let proof = adapter.execute(&manifest, &workcell_path, timeout).await;
        let outcome = self.judge_attempt(issue, &manifest, proof, &workcell_path).await;
        // Archive everything that ran, success or not.
        self.workcells.cleanup(&workcell_path, true).await;
        Ok(outcome)
    }

    /// Shared post-execution pipeline: forbidden-path scan, verification,
    /// proof persistence, workcell completion events.
    async fn judge_attempt(
        &self,
        issue: &Issue,
        manifest: &Manifest,
        mut proof: PatchProof,
        workcell_path: &Path,
    ) -> AttemptOutcome {
        let events = self.state.events().clone();
        let workcell_id = manifest.workcell_id.clone();
        let toolchain = manifest.toolchain.clone();

        // Mandatory forbidden-path enforcement against the produced patch.
        let violations =
            forbidden_path_violations(&proof.patch.files_modified, &issue.dk_forbidden_paths);
        if !violations.is_empty() {
            proof.patch.forbidden_path_violations = violations.clone();
            proof.risk_classification = proof.risk_classification.max(Risk::Critical);
            self.write_proof(workcell_path, &proof);
            events.emit(
                &Event::new(EventType::WorkcellFailed, self.clock.now())
                    .issue_id(issue.id.clone())
                    .workcell_id(workcell_id)
                    .datum("reason", FORBIDDEN_PATH_REASON)
                    .datum("violations", violations.clone()),
            );
            return AttemptOutcome::ForbiddenPaths { proof: Box::new(proof), violations };
        }

        // The verifier fills the verification block unless the adapter
        // already ran gates itself.
        if !proof.outcome.is_hard_failure() && proof.verification.gates.is_empty() {
            proof.verification = self
                .verifier
                .verify(workcell_path, &workcell_id, &issue.id, self.clock.now())
                .await;
        }
        self.write_proof(workcell_path, &proof);

        // Soft per-attempt token ceiling.
        let token_ceiling = self.config.toolchain(&toolchain).map(|tc| tc.max_tokens);
        let over_budget = match (token_ceiling, proof.metadata.tokens_used) {
            (Some(ceiling), Some(used)) => used > ceiling,
            _ => false,
        };

        match proof.outcome {
            Outcome::Timeout => {
                events.emit(
                    &Event::new(EventType::WorkcellTimeout, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(workcell_id)
                        .datum("toolchain", toolchain),
                );
                let error = proof.error.clone().unwrap_or_else(|| "timeout".to_string());
                AttemptOutcome::Failed { error, proof: Some(Box::new(proof)) }
            }
            Outcome::Error => {
                events.emit(
                    &Event::new(EventType::WorkcellFailed, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(workcell_id)
                        .datum("toolchain", toolchain),
                );
                let error = proof.error.clone().unwrap_or_else(|| "adapter error".to_string());
                AttemptOutcome::Failed { error, proof: Some(Box::new(proof)) }
            }
            _ if over_budget => {
                events.emit(
                    &Event::new(EventType::WorkcellFailed, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(workcell_id)
                        .datum("reason", "token_budget_exceeded"),
                );
                AttemptOutcome::Failed {
                    error: "token budget exceeded".to_string(),
                    proof: Some(Box::new(proof)),
                }
            }
            Outcome::Success if proof.verification.all_passed => {
                events.emit(
                    &Event::new(EventType::WorkcellCompleted, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(workcell_id)
                        .datum("status", proof.outcome.to_string())
                        .duration_ms(proof.metadata.duration_ms)
                        .tokens_used(proof.metadata.tokens_used.unwrap_or(0))
                        .cost_usd(proof.metadata.cost_usd.unwrap_or(0.0)),
                );
                AttemptOutcome::Accepted { proof: Box::new(proof) }
            }
            _ => {
                events.emit(
                    &Event::new(EventType::WorkcellCompleted, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(workcell_id)
                        .datum("status", proof.outcome.to_string())
                        .datum("all_passed", proof.verification.all_passed),
                );
                let error = if proof.outcome.is_success() {
                    format!("gates failed: {}", proof.verification.blocking_failures.join(", "))
                } else {
                    format!("adapter outcome {}", proof.outcome)
                };
                AttemptOutcome::Failed { error, proof: Some(Box::new(proof)) }
            }
        }
    }

    // -- speculate dispatch --

    async fn dispatch_speculate(&self, issue: &Issue) -> AttemptOutcome {
        let router = Router::new(&self.config);
        let available = self.probe_available().await;

        let mut candidates: Vec<String> = router
            .speculate_candidates(issue)
            .into_iter()
            .filter(|name| available.contains(name) && self.registry.contains(name))
            .collect();
        if candidates.is_empty() {
            candidates = router
                .ordered_candidates(issue)
                .into_iter()
                .filter(|name| available.contains(name) && self.registry.contains(name))
                .collect();
        }
        if candidates.is_empty() {
            return AttemptOutcome::Failed {
                error: "no toolchain available for speculation".to_string(),
                proof: None,
            };
        }

        let parallelism = router.speculate_parallelism(issue).max(1);
        self.state.events().emit(
            &Event::new(EventType::SpeculateStarted, self.clock.now())
                .issue_id(issue.id.clone())
                .datum("candidates", candidates.clone())
                .datum("parallelism", parallelism as u64),
        );

        // Fan out: one workcell per attempt, candidates cycled.
        let mut join_set: JoinSet<(PatchProof, PathBuf)> = JoinSet::new();
        for index in 0..parallelism {
            let toolchain = &candidates[index % candidates.len()];
            let Some(adapter) = self.registry.get(toolchain) else { continue };
            let tag = format!("spec-{index}");

            let workcell_path =
                match self.workcells.create(&issue.id, Some(tag.clone()), self.clock.now()).await {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(issue_id = %issue.id, %tag, error = %e, "speculate workcell failed");
                        continue;
                    }
                };
            let workcell_id = workcell_name(&workcell_path);
            let manifest =
                self.build_manifest(issue, &workcell_id, adapter.name(), Some(tag));
            if let Err(e) = self.write_manifest(&workcell_path, &manifest) {
                tracing::warn!(issue_id = %issue.id, error = %e, "speculate manifest write failed");
                self.workcells.cleanup(&workcell_path, false).await;
                continue;
            }
            self.emit_workcell_started(&issue.id, &workcell_id, adapter.name());

            let verifier = self.verifier.clone();
            let forbidden = issue.dk_forbidden_paths.clone();
            let issue_id = issue.id.clone();
            let now = self.clock.now();
            let timeout = Duration::from_secs(manifest.timeout_seconds);
            join_set.spawn(async move {
                let mut proof = adapter.execute(&manifest, &workcell_path, timeout).await;
                proof.patch.forbidden_path_violations =
                    forbidden_path_violations(&proof.patch.files_modified, &forbidden);
                if !proof.outcome.is_hard_failure()
                    && proof.verification.gates.is_empty()
                    && proof.patch.forbidden_path_violations.is_empty()
                {
                    proof.verification =
                        verifier.verify(&workcell_path, &manifest.workcell_id, &issue_id, now).await;
                }
                (proof, workcell_path)
            });
        }

        let mut produced: Vec<(PatchProof, PathBuf)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(candidate) => produced.push(candidate),
                Err(e) => tracing::warn!(issue_id = %issue.id, error = %e, "speculate task died"),
            }
        }
        if produced.is_empty() {
            return AttemptOutcome::Failed {
                error: "sandbox: no speculate workcell could be created".to_string(),
                proof: None,
            };
        }

        for (proof, path) in &produced {
            self.write_proof(path, proof);
        }

        let proofs: Vec<PatchProof> = produced.iter().map(|(p, _)| p.clone()).collect();
        let winner = self.verifier.compare_candidates(&issue.id, &proofs, self.clock.now());

        match winner {
            Some(index) => {
                let (winner_proof, winner_path) = &produced[index];

                if !winner_proof.patch.forbidden_path_violations.is_empty() {
                    // A violating patch is never accepted.
                    let violations = winner_proof.patch.forbidden_path_violations.clone();
                    let proof = winner_proof.clone();
                    self.cleanup_all(&produced).await;
                    return AttemptOutcome::ForbiddenPaths { proof: Box::new(proof), violations };
                }

                // Losers are archived first, then the winner.
                for (i, (_, path)) in produced.iter().enumerate() {
                    if i != index {
                        self.workcells.cleanup(path, true).await;
                    }
                }
                self.state.events().emit(
                    &Event::new(EventType::WorkcellCompleted, self.clock.now())
                        .issue_id(issue.id.clone())
                        .workcell_id(winner_proof.workcell_id.clone())
                        .datum("status", winner_proof.outcome.to_string())
                        .datum("speculate_winner", true),
                );
                let proof = winner_proof.clone();
                self.workcells.cleanup(winner_path, true).await;
                AttemptOutcome::Accepted { proof: Box::new(proof) }
            }
            None => {
                let all_violate = produced
                    .iter()
                    .all(|(p, _)| !p.patch.forbidden_path_violations.is_empty());
                let outcome = if all_violate {
                    let (proof, _) = &produced[0];
                    AttemptOutcome::ForbiddenPaths {
                        proof: Box::new(proof.clone()),
                        violations: proof.patch.forbidden_path_violations.clone(),
                    }
                } else {
                    AttemptOutcome::Failed {
                        error: "no speculate candidate passed gates".to_string(),
                        proof: None,
                    }
                };
                self.cleanup_all(&produced).await;
                outcome
            }
        }
    }

    async fn cleanup_all(&self, produced: &[(PatchProof, PathBuf)]) {
        for (_, path) in produced {
            self.workcells.cleanup(path, true).await;
        }
    }

    // -- shared helpers --

    /// Probe adapter availability and report it to the event stream.
    async fn probe_available(&self) -> Vec<String> {
        let available = self.registry.available().await;
        let unhealthy: Vec<&String> = self
            .registry
            .names()
            .iter()
            .filter(|n| !available.iter().any(|a| a.as_str() == n.as_str()))
            .collect();
        if !unhealthy.is_empty() {
            self.state.events().emit(
                &Event::new(EventType::AdapterHealth, self.clock.now())
                    .datum("available", available.clone())
                    .datum(
                        "unavailable",
                        unhealthy.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
                    ),
            );
        }
        available
    }

    fn build_manifest(
        &self,
        issue: &Issue,
        workcell_id: &str,
        toolchain: &str,
        speculate_tag: Option<String>,
    ) -> Manifest {
        let marker_branch = self
            .workcells
            .marker(&self.config.workcells_dir().join(workcell_id))
            .map(|m| m.branch())
            .unwrap_or_default();

        let toolchain_config = self.config.toolchain(toolchain);
        let mut manifest = Manifest::new(workcell_id, issue, toolchain, marker_branch)
            .quality_gates(self.config.gates.commands())
            .timeout_seconds(
                toolchain_config.map_or(1800, |tc| tc.timeout_seconds),
            );
        if let Some(tc) = toolchain_config {
            manifest.toolchain_config = tc.config.clone();
        }
        if let Some(tag) = speculate_tag {
            manifest = manifest.speculate(tag);
        }
        manifest
    }

    fn write_manifest(
        &self,
        workcell_path: &Path,
        manifest: &Manifest,
    ) -> Result<(), crate::workcell::SandboxError> {
        let path = workcell_path.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, json)
            .map_err(|source| crate::workcell::SandboxError::Io { path, source })
    }

    fn write_proof(&self, workcell_path: &Path, proof: &PatchProof) {
        let path = workcell_path.join(PROOF_FILE);
        let write = || -> std::io::Result<()> {
            let json = serde_json::to_string_pretty(proof)?;
            std::fs::write(&path, json)
        };
        if let Err(e) = write() {
            tracing::warn!(path = %path.display(), error = %e, "failed to write proof");
        }
    }

    fn emit_workcell_started(&self, issue_id: &str, workcell_id: &str, toolchain: &str) {
        let events = self.state.events();
        events.emit(
            &Event::new(EventType::WorkcellCreated, self.clock.now())
                .issue_id(issue_id)
                .workcell_id(workcell_id)
                .datum("toolchain", toolchain),
        );
        events.emit(
            &Event::new(EventType::WorkcellStarted, self.clock.now())
                .issue_id(issue_id)
                .workcell_id(workcell_id)
                .datum("toolchain", toolchain),
        );
    }
}

fn workcell_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
