// SPDX-License-Identifier: MIT

//! Issue record and its status state machine.

use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue priority, P0 highest. Sorts ascending so P0 comes first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    P0,
    P1,
    #[default]
    P2,
    P3,
}

impl Priority {
    /// Raise priority by one step, saturating at P0.
    pub fn boosted(self) -> Self {
        match self {
            Priority::P0 | Priority::P1 => Priority::P0,
            Priority::P2 => Priority::P1,
            Priority::P3 => Priority::P2,
        }
    }
}

crate::display_names! {
    Priority {
        P0 => "P0",
        P1 => "P1",
        P2 => "P2",
        P3 => "P3",
    }
}

/// Risk classification. Sorts ascending from low to critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

crate::display_names! {
    Risk {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

/// T-shirt size estimate. Sorts ascending from XS to XL.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Size {
    XS,
    S,
    #[default]
    M,
    L,
    XL,
}

impl Size {
    /// Effort weight used for critical-path calculation.
    pub fn weight(self) -> u32 {
        match self {
            Size::XS => 1,
            Size::S => 2,
            Size::M => 4,
            Size::L => 8,
            Size::XL => 16,
        }
    }
}

crate::display_names! {
    Size {
        XS => "XS",
        S => "S",
        M => "M",
        L => "L",
        XL => "XL",
    }
}

/// Issue lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    Open,
    Ready,
    Running,
    Done,
    Escalated,
    Blocked,
}

impl IssueStatus {
    /// Whether a transition to `to` is permitted by the state machine.
    ///
    /// Permitted transitions:
    /// - open → ready (blockers resolved)
    /// - open|ready → running (dispatch begins)
    /// - running → done | ready | escalated
    /// - escalated → ready (human re-queue)
    /// - any non-terminal → blocked; blocked → ready
    ///
    /// `done` is terminal; re-opening it requires the forced update path.
    pub fn can_transition(self, to: IssueStatus) -> bool {
        use IssueStatus::*;
        matches!(
            (self, to),
            (Open, Ready)
                | (Open, Running)
                | (Ready, Running)
                | (Running, Done)
                | (Running, Ready)
                | (Running, Escalated)
                | (Escalated, Ready)
                | (Open, Blocked)
                | (Ready, Blocked)
                | (Running, Blocked)
                | (Escalated, Blocked)
                | (Blocked, Ready)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IssueStatus::Done)
    }

    /// Whether an issue in this status counts toward the ready set.
    pub fn is_schedulable(self) -> bool {
        matches!(self, IssueStatus::Open | IssueStatus::Ready)
    }
}

crate::display_names! {
    IssueStatus {
        Open => "open",
        Ready => "ready",
        Running => "running",
        Done => "done",
        Escalated => "escalated",
        Blocked => "blocked",
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_estimated_tokens() -> u64 {
    50_000
}

/// A unit of work in the graph.
///
/// Extension fields use the `dk_` namespace on disk; un-prefixed spellings
/// from older records are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: IssueStatus,
    #[serde(with = "time::ts")]
    pub created: DateTime<Utc>,
    #[serde(with = "time::ts")]
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, alias = "priority")]
    pub dk_priority: Priority,
    #[serde(default, alias = "risk")]
    pub dk_risk: Risk,
    #[serde(default, alias = "size")]
    pub dk_size: Size,
    #[serde(default, alias = "tool_hint", skip_serializing_if = "Option::is_none")]
    pub dk_tool_hint: Option<String>,
    #[serde(default)]
    pub dk_speculate: bool,
    #[serde(default = "default_max_attempts")]
    pub dk_max_attempts: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dk_forbidden_paths: Vec<String>,
    #[serde(default)]
    pub dk_required_reviewers: u32,
    #[serde(default, alias = "parent", skip_serializing_if = "Option::is_none")]
    pub dk_parent: Option<String>,
    #[serde(default = "default_estimated_tokens")]
    pub dk_estimated_tokens: u64,
    #[serde(default)]
    pub dk_attempts: u32,
    /// Transient starvation flag, set by the scheduler. Never persisted.
    #[serde(default, skip)]
    pub dk_starved: bool,

    #[serde(default, with = "time::ts_opt", skip_serializing_if = "Option::is_none")]
    pub ready_since: Option<DateTime<Utc>>,
}

impl Issue {
    /// Create a new open issue with default extension fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: IssueStatus::Open,
            created: now,
            updated: now,
            acceptance_criteria: None,
            context_files: None,
            tags: Vec::new(),
            dk_priority: Priority::default(),
            dk_risk: Risk::default(),
            dk_size: Size::default(),
            dk_tool_hint: None,
            dk_speculate: false,
            dk_max_attempts: default_max_attempts(),
            dk_forbidden_paths: Vec::new(),
            dk_required_reviewers: 0,
            dk_parent: None,
            dk_estimated_tokens: default_estimated_tokens(),
            dk_attempts: 0,
            dk_starved: false,
            ready_since: None,
        }
    }

    /// Whether the attempt budget still allows another dispatch.
    pub fn can_attempt(&self) -> bool {
        self.dk_attempts < self.dk_max_attempts
    }

    /// Remaining attempts before escalation.
    pub fn attempts_remaining(&self) -> u32 {
        self.dk_max_attempts.saturating_sub(self.dk_attempts)
    }
}

crate::builder! {
    pub struct IssueBuilder => Issue {
        into {
            id: String = "1",
            title: String = "Test issue",
        }
        set {
            status: IssueStatus = IssueStatus::Open,
            tags: Vec<String> = Vec::new(),
            dk_priority: Priority = Priority::P2,
            dk_risk: Risk = Risk::Medium,
            dk_size: Size = Size::M,
            dk_speculate: bool = false,
            dk_max_attempts: u32 = 3,
            dk_forbidden_paths: Vec<String> = Vec::new(),
            dk_required_reviewers: u32 = 0,
            dk_estimated_tokens: u64 = 50_000,
            dk_attempts: u32 = 0,
            dk_starved: bool = false,
        }
        option {
            description: String = None,
            acceptance_criteria: Vec<String> = None,
            context_files: Vec<String> = None,
            dk_tool_hint: String = None,
            dk_parent: String = None,
            ready_since: chrono::DateTime<chrono::Utc> = None,
        }
        computed {
            created: chrono::DateTime<chrono::Utc> = chrono::Utc::now(),
            updated: chrono::DateTime<chrono::Utc> = chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
