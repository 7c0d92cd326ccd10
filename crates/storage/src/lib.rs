// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-storage: Durable state for the orchestrator.
//!
//! Three stores, each exclusively owned:
//! - the work graph (append-only issue/dep JSONL streams),
//! - the event log (append-only JSONL observability stream),
//! - the flaky-test store (single JSON document).

mod events;
mod flaky;
mod graph;

pub use events::{EventLog, EventStats};
pub use flaky::{FlakyData, FlakyEntry, FlakyStore};
pub use graph::{GraphError, NewIssue, StateManager};
