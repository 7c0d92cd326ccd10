// SPDX-License-Identifier: MIT

//! Dependency edges between issues.

use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Edge type. Only `blocks` affects readiness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepType {
    #[default]
    Blocks,
    Unblocks,
    Discovered,
    FixFor,
    Speculate,
    ReviewOf,
}

crate::display_names! {
    DepType {
        Blocks => "blocks",
        Unblocks => "unblocks",
        Discovered => "discovered",
        FixFor => "fix-for",
        Speculate => "speculate",
        ReviewOf => "review-of",
    }
}

/// A directed edge from issue `from_id` to issue `to_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dep {
    #[serde(rename = "from", alias = "from_id")]
    pub from_id: String,
    #[serde(rename = "to", alias = "to_id")]
    pub to_id: String,
    #[serde(rename = "type", alias = "dep_type", default)]
    pub dep_type: DepType,
    #[serde(with = "time::ts", default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl Dep {
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        dep_type: DepType,
        now: DateTime<Utc>,
    ) -> Self {
        Self { from_id: from_id.into(), to_id: to_id.into(), dep_type, created: now }
    }

    pub fn is_blocks(&self) -> bool {
        self.dep_type == DepType::Blocks
    }

    /// Identity for duplicate detection: (from, to, type).
    pub fn key(&self) -> (&str, &str, DepType) {
        (&self.from_id, &self.to_id, self.dep_type)
    }
}

#[cfg(test)]
#[path = "dep_tests.rs"]
mod tests;
