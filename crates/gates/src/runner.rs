// SPDX-License-Identifier: MIT

//! Gate runner: sequential execution with timeout and retry.

use crate::summary::extract_failure_summary;
use foreman_adapters::subprocess::{self, SubprocessError};
use foreman_core::WORKCELL_LOGS_DIR;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Definition of a single gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSpec {
    pub name: String,
    pub command: String,
    pub timeout: Duration,
    /// Total executions allowed (1 = no retry).
    pub retries: u32,
}

impl GateSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            timeout: Duration::from_secs(300),
            retries: 1,
        }
    }

    foreman_core::setters! {
        set {
            timeout: Duration,
            retries: u32,
        }
    }
}

/// Result of running a single quality gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub name: String,
    pub passed: bool,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub output_path: Option<PathBuf>,
    pub failure_summary: Option<String>,
    /// 1-based attempt that produced this result.
    pub attempt: u32,
    /// Passed only after a failing attempt.
    pub flaky_detected: bool,
}

/// Executes quality gates inside a workcell and collects results.
pub struct GateRunner {
    workcell_path: PathBuf,
}

impl GateRunner {
    pub fn new(workcell_path: impl Into<PathBuf>) -> Self {
        Self { workcell_path: workcell_path.into() }
    }

    /// Run gates sequentially, fail-fast.
    ///
    /// A failing gate is retried up to its `retries` budget; passing on a
    /// retry marks the result flaky. Once a gate exhausts its budget
    /// without passing, later gates are not run.
    pub async fn run_all(&self, gates: &[GateSpec]) -> IndexMap<String, GateResult> {
        let mut results = IndexMap::new();

        for gate in gates {
            let result = self.run_gate_with_retries(gate).await;
            let passed = result.passed;
            results.insert(gate.name.clone(), result);
            if !passed {
                break;
            }
        }

        results
    }

    /// Run one gate through its full retry budget.
    ///
    /// A pass on attempt ≥ 2 marks the result flaky.
    pub async fn run_gate_with_retries(&self, gate: &GateSpec) -> GateResult {
        let mut result = self.run_gate(gate, 1).await;

        if !result.passed && gate.retries > 1 {
            for attempt in 2..=gate.retries {
                tracing::info!(
                    gate = %gate.name,
                    attempt,
                    max_attempts = gate.retries,
                    "retrying gate"
                );
                result = self.run_gate(gate, attempt).await;
                if result.passed {
                    result.flaky_detected = true;
                    break;
                }
            }
        }

        result
    }

    /// Run one gate once.
    pub async fn run_gate(&self, gate: &GateSpec, attempt: u32) -> GateResult {
        let started = Instant::now();
        tracing::info!(gate = %gate.name, command = %gate.command, attempt, "running gate");

        let output = subprocess::run_shell(
            &gate.command,
            &self.workcell_path,
            gate.timeout,
            &format!("gate {}", gate.name),
        )
        .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match output {
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let passed = output.status.success();
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let output_path = self.write_log(&gate.name, &stdout, &stderr);
                let failure_summary =
                    (!passed).then(|| extract_failure_summary(&stdout, &stderr));

                tracing::info!(gate = %gate.name, passed, exit_code, duration_ms, "gate completed");
                GateResult {
                    name: gate.name.clone(),
                    passed,
                    exit_code,
                    duration_ms,
                    output_path,
                    failure_summary,
                    attempt,
                    flaky_detected: false,
                }
            }
            Err(e) => {
                // Timeouts and spawn failures are both gate failures.
                let summary = match &e {
                    SubprocessError::Timeout { .. } => {
                        format!("Timeout after {}s", gate.timeout.as_secs())
                    }
                    other => other.to_string(),
                };
                tracing::error!(gate = %gate.name, error = %summary, "gate did not complete");
                GateResult {
                    name: gate.name.clone(),
                    passed: false,
                    exit_code: -1,
                    duration_ms,
                    output_path: None,
                    failure_summary: Some(summary),
                    attempt,
                    flaky_detected: false,
                }
            }
        }
    }

    fn write_log(&self, name: &str, stdout: &str, stderr: &str) -> Option<PathBuf> {
        let logs_dir = self.workcell_path.join(WORKCELL_LOGS_DIR);
        if let Err(e) = std::fs::create_dir_all(&logs_dir) {
            tracing::warn!(error = %e, "failed to create gate log dir");
            return None;
        }
        let path = logs_dir.join(format!("{name}.log"));
        let contents = format!("=== STDOUT ===\n{stdout}\n=== STDERR ===\n{stderr}\n");
        match std::fs::write(&path, contents) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write gate log");
                None
            }
        }
    }

    pub fn workcell_path(&self) -> &Path {
        &self.workcell_path
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
