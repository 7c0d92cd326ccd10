// SPDX-License-Identifier: MIT

//! Verifier: gate execution, flaky classification, and candidate voting.

use chrono::{DateTime, Utc};
use foreman_config::Config;
use foreman_core::{Event, EventType, GateCheck, PatchProof, Verification};
use foreman_gates::{GateRunner, GateSpec};
use foreman_storage::{EventLog, FlakyStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One candidate's position in a speculate vote.
#[derive(Debug, Clone)]
pub struct CandidateRanking {
    pub workcell_id: String,
    pub toolchain: String,
    pub score: f64,
    pub all_passed: bool,
    pub retried_gates: u32,
    pub confidence: f64,
}

/// Gate execution plus candidate comparison.
///
/// Cheap to clone; speculate fan-out hands one clone to each candidate
/// task.
#[derive(Clone)]
pub struct Verifier {
    config: Arc<Config>,
    flaky: Arc<FlakyStore>,
    events: EventLog,
}

impl Verifier {
    pub fn new(config: Arc<Config>, flaky: Arc<FlakyStore>, events: EventLog) -> Self {
        Self { config, flaky, events }
    }

    /// The configured quality-gate set as runnable specs.
    pub fn gate_specs(&self) -> Vec<GateSpec> {
        let gates = &self.config.gates;
        gates
            .commands()
            .into_iter()
            .map(|(name, command)| {
                GateSpec::new(name, command)
                    .timeout(Duration::from_secs(gates.timeout_seconds))
                    .retries(gates.retry_flaky.max(1))
            })
            .collect()
    }

    /// Run the gate set against a workcell and build the verification
    /// block.
    ///
    /// Gates matching an ignored flaky entry never block: their failures
    /// are recorded but do not stop later gates or aggregate pass. Gates
    /// that passed only on retry are recorded into the flaky store.
    pub async fn verify(
        &self,
        workcell_path: &Path,
        workcell_id: &str,
        issue_id: &str,
        now: DateTime<Utc>,
    ) -> Verification {
        let specs = self.gate_specs();
        self.events.emit(
            &Event::new(EventType::GatesStarted, now)
                .issue_id(issue_id)
                .workcell_id(workcell_id)
                .datum("gates", specs.iter().map(|g| g.name.clone()).collect::<Vec<_>>()),
        );

        let runner = GateRunner::new(workcell_path);
        let mut verification = Verification { all_passed: true, ..Default::default() };

        for spec in &specs {
            let result = runner.run_gate_with_retries(spec).await;

            if result.flaky_detected {
                self.flaky.record(&flaky_key(&result.name), now);
            }

            let ignored = self.flaky.is_ignored(&flaky_key(&result.name));
            let blocking = !result.passed && !ignored;
            if !result.passed && ignored {
                tracing::info!(gate = %result.name, "ignored flaky gate failed, not blocking");
            }

            verification.gates.insert(
                result.name.clone(),
                GateCheck {
                    passed: result.passed,
                    exit_code: result.exit_code,
                    duration_ms: result.duration_ms,
                    flaky: result.flaky_detected,
                },
            );
            if blocking {
                verification.all_passed = false;
                verification.blocking_failures.push(result.name.clone());
                break;
            }
        }

        let gates_json = serde_json::to_value(&verification.gates).unwrap_or_default();
        let event_type =
            if verification.all_passed { EventType::GatesPassed } else { EventType::GatesFailed };
        self.events.emit(
            &Event::new(event_type, now)
                .issue_id(issue_id)
                .workcell_id(workcell_id)
                .datum("gates", gates_json),
        );

        verification
    }

    /// Compare speculate candidates and pick a winner.
    ///
    /// Scoring: +100 aggregate-pass, +confidence×20, −40 per
    /// forbidden-path violation, −10 per retried gate. Ties break on
    /// fewer retries, then higher confidence, then lexicographic adapter
    /// name. Returns the winning index, or None when no candidate passed
    /// its gates (the dispatch is then a failure).
    pub fn compare_candidates(
        &self,
        issue_id: &str,
        candidates: &[PatchProof],
        now: DateTime<Utc>,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let mut rankings: Vec<(usize, CandidateRanking)> = candidates
            .iter()
            .enumerate()
            .map(|(index, proof)| (index, rank(proof)))
            .collect();

        rankings.sort_by(|(_, a), (_, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.retried_gates.cmp(&b.retried_gates))
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.toolchain.cmp(&b.toolchain))
        });

        let ranking_json: Vec<serde_json::Value> = rankings
            .iter()
            .map(|(_, r)| {
                serde_json::json!({
                    "workcell_id": r.workcell_id,
                    "toolchain": r.toolchain,
                    "score": r.score,
                    "all_passed": r.all_passed,
                    "retried_gates": r.retried_gates,
                    "confidence": r.confidence,
                })
            })
            .collect();
        self.events.emit(
            &Event::new(EventType::SpeculateVoted, now)
                .issue_id(issue_id)
                .datum("ranking", ranking_json),
        );

        let (winner_index, winner) = &rankings[0];
        if !winner.all_passed {
            tracing::info!(issue_id, "no speculate candidate passed gates");
            return None;
        }

        self.events.emit(
            &Event::new(EventType::SpeculateWinner, now)
                .issue_id(issue_id)
                .workcell_id(winner.workcell_id.clone())
                .datum("toolchain", winner.toolchain.clone())
                .datum("score", winner.score),
        );
        Some(*winner_index)
    }
}

fn rank(proof: &PatchProof) -> CandidateRanking {
    let retried_gates =
        proof.verification.gates.values().filter(|check| check.flaky).count() as u32;
    let violations = proof.patch.forbidden_path_violations.len() as f64;

    let mut score = 0.0;
    if proof.verification.all_passed {
        score += 100.0;
    }
    score += proof.confidence * 20.0;
    score -= violations * 40.0;
    score -= retried_gates as f64 * 10.0;

    CandidateRanking {
        workcell_id: proof.workcell_id.clone(),
        toolchain: proof.metadata.toolchain.clone(),
        score,
        all_passed: proof.verification.all_passed,
        retried_gates,
        confidence: proof.confidence,
    }
}

/// Flaky-store key for a gate (runners do not parse individual test names).
pub fn flaky_key(gate_name: &str) -> String {
    format!("gate:{gate_name}")
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
