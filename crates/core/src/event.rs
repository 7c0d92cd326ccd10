// SPDX-License-Identifier: MIT

//! Lifecycle events for the observability stream.
//!
//! One JSON object per line in `events.jsonl`; the wire format is flat
//! (`type`, `timestamp`, optional ids, data bag, metrics) so external
//! consumers can filter with nothing but a line scanner.

use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enumerated event types covering the kernel lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // Lifecycle
    #[serde(rename = "kernel.started")]
    KernelStarted,
    #[serde(rename = "kernel.stopped")]
    KernelStopped,
    #[serde(rename = "cycle.started")]
    CycleStarted,
    #[serde(rename = "cycle.completed")]
    CycleCompleted,

    // Scheduling
    #[serde(rename = "schedule.computed")]
    ScheduleComputed,
    #[serde(rename = "issue.scheduled")]
    IssueScheduled,
    #[serde(rename = "issue.skipped")]
    IssueSkipped,

    // Dispatch
    #[serde(rename = "workcell.created")]
    WorkcellCreated,
    #[serde(rename = "workcell.started")]
    WorkcellStarted,
    #[serde(rename = "workcell.completed")]
    WorkcellCompleted,
    #[serde(rename = "workcell.failed")]
    WorkcellFailed,
    #[serde(rename = "workcell.timeout")]
    WorkcellTimeout,

    // Verification
    #[serde(rename = "gates.started")]
    GatesStarted,
    #[serde(rename = "gates.passed")]
    GatesPassed,
    #[serde(rename = "gates.failed")]
    GatesFailed,

    // Speculate
    #[serde(rename = "speculate.started")]
    SpeculateStarted,
    #[serde(rename = "speculate.voted")]
    SpeculateVoted,
    #[serde(rename = "speculate.winner")]
    SpeculateWinner,

    // Issues
    #[serde(rename = "issue.started")]
    IssueStarted,
    #[serde(rename = "issue.completed")]
    IssueCompleted,
    #[serde(rename = "issue.failed")]
    IssueFailed,
    #[serde(rename = "issue.escalated")]
    IssueEscalated,
    #[serde(rename = "issue.created")]
    IssueCreated,

    // System
    #[serde(rename = "adapter.health")]
    AdapterHealth,
    #[serde(rename = "error")]
    Error,
}

crate::display_names! {
    EventType {
        KernelStarted => "kernel.started",
        KernelStopped => "kernel.stopped",
        CycleStarted => "cycle.started",
        CycleCompleted => "cycle.completed",
        ScheduleComputed => "schedule.computed",
        IssueScheduled => "issue.scheduled",
        IssueSkipped => "issue.skipped",
        WorkcellCreated => "workcell.created",
        WorkcellStarted => "workcell.started",
        WorkcellCompleted => "workcell.completed",
        WorkcellFailed => "workcell.failed",
        WorkcellTimeout => "workcell.timeout",
        GatesStarted => "gates.started",
        GatesPassed => "gates.passed",
        GatesFailed => "gates.failed",
        SpeculateStarted => "speculate.started",
        SpeculateVoted => "speculate.voted",
        SpeculateWinner => "speculate.winner",
        IssueStarted => "issue.started",
        IssueCompleted => "issue.completed",
        IssueFailed => "issue.failed",
        IssueEscalated => "issue.escalated",
        IssueCreated => "issue.created",
        AdapterHealth => "adapter.health",
        Error => "error",
    }
}

/// A single structured event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "time::ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workcell_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,

    // Metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl Event {
    pub fn new(event_type: EventType, now: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp: now,
            issue_id: None,
            workcell_id: None,
            data: Map::new(),
            duration_ms: None,
            tokens_used: None,
            cost_usd: None,
        }
    }

    crate::setters! {
        option {
            issue_id: String,
            workcell_id: String,
            duration_ms: u64,
            tokens_used: u64,
            cost_usd: f64,
        }
    }

    /// Attach a key/value pair to the data bag.
    pub fn datum(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
