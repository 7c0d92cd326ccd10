// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-core: Data model for the Foreman orchestrator.
//!
//! Issues, dependency edges, the work graph, lifecycle events, adapter
//! manifests and patch proofs, and the workcell naming scheme. Everything
//! here is plain data; behavior lives in the storage and engine crates.

pub mod macros;

pub mod clock;
pub mod dep;
pub mod event;
pub mod graph;
pub mod issue;
pub mod manifest;
pub mod proof;
pub mod time;
pub mod workcell;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use dep::{Dep, DepType};
pub use event::{Event, EventType};
pub use graph::WorkGraph;
#[cfg(any(test, feature = "test-support"))]
pub use issue::IssueBuilder;
pub use issue::{Issue, IssueStatus, Priority, Risk, Size};
pub use manifest::{Manifest, ManifestIssue, MANIFEST_SCHEMA_VERSION};
pub use proof::{
    forbidden_path_violations, DiffStats, FollowUp, GateCheck, GraphMutation, Outcome, PatchProof,
    PatchSummary, ProofMetadata, Verification, PROOF_SCHEMA_VERSION,
};
pub use workcell::{
    WorkcellMarker, WorkcellName, MANIFEST_FILE, MARKER_FILE, PROOF_FILE, WORKCELL_LOGS_DIR,
};
