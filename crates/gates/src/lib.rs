// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-gates: Quality gate execution.
//!
//! A gate is a shell command run inside a workcell; the gate runner
//! executes the configured set sequentially, fail-fast, with per-gate
//! timeout and a retry budget for flaky gates. Output is captured to
//! `logs/<name>.log`.

mod runner;
mod summary;

pub use runner::{GateResult, GateRunner, GateSpec};
pub use summary::extract_failure_summary;
