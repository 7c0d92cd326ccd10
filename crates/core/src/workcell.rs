// SPDX-License-Identifier: MIT

//! Workcell naming scheme and the `.workcell` isolation marker.
//!
//! A workcell is one isolated sandbox for one attempt. Its id is composed
//! from the issue id, an optional speculate tag, and a compact UTC
//! timestamp; the branch name is derivable from the id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker file written into every workcell root.
pub const MARKER_FILE: &str = ".workcell";
/// Manifest file written into every workcell root before dispatch.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Proof file written into the workcell root after a dispatch completes.
pub const PROOF_FILE: &str = "proof.json";
/// Per-workcell log directory.
pub const WORKCELL_LOGS_DIR: &str = "logs";

/// Format a timestamp in the compact form used in workcell names.
pub fn compact_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Composed name of a workcell: issue id + optional speculate tag + timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkcellName {
    pub issue_id: String,
    pub speculate_tag: Option<String>,
    pub timestamp: String,
}

impl WorkcellName {
    pub fn new(issue_id: impl Into<String>, speculate_tag: Option<String>, now: DateTime<Utc>) -> Self {
        Self { issue_id: issue_id.into(), speculate_tag, timestamp: compact_timestamp(now) }
    }

    /// Directory name: `wc-<issue>[-<tag>]-<timestamp>`.
    pub fn id(&self) -> String {
        match &self.speculate_tag {
            Some(tag) => format!("wc-{}-{}-{}", self.issue_id, tag, self.timestamp),
            None => format!("wc-{}-{}", self.issue_id, self.timestamp),
        }
    }

    /// Branch name: `wc/<issue>[/<tag>]/<timestamp>`.
    ///
    /// The tag segment keeps branches of parallel speculate attempts
    /// distinct even when they are created within the same second.
    pub fn branch(&self) -> String {
        match &self.speculate_tag {
            Some(tag) => format!("wc/{}/{}/{}", self.issue_id, tag, self.timestamp),
            None => format!("wc/{}/{}", self.issue_id, self.timestamp),
        }
    }
}

/// Isolation marker written to `.workcell` in the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkcellMarker {
    pub id: String,
    pub issue_id: String,
    /// Compact UTC timestamp matching the workcell name.
    pub created: String,
    pub parent_commit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speculate_tag: Option<String>,
}

impl WorkcellMarker {
    pub fn new(name: &WorkcellName, parent_commit: impl Into<String>) -> Self {
        Self {
            id: name.id(),
            issue_id: name.issue_id.clone(),
            created: name.timestamp.clone(),
            parent_commit: parent_commit.into(),
            speculate_tag: name.speculate_tag.clone(),
        }
    }

    /// Reconstruct the branch name from marker fields.
    pub fn branch(&self) -> String {
        match &self.speculate_tag {
            Some(tag) => format!("wc/{}/{}/{}", self.issue_id, tag, self.created),
            None => format!("wc/{}/{}", self.issue_id, self.created),
        }
    }
}

#[cfg(test)]
#[path = "workcell_tests.rs"]
mod tests;
