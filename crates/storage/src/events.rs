// SPDX-License-Identifier: MIT

//! Append-only event log.
//!
//! One JSON object per line. Writes are fire-and-forget from the caller's
//! perspective: an event log failure must never break the pipeline, so
//! errors are traced and swallowed. Reads are forward scans; there is no
//! index.

use foreman_core::{Event, EventType};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Append-only structured event stream.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append an event. Failures are logged and swallowed.
    pub fn emit(&self, event: &Event) {
        if let Err(e) = self.try_emit(event) {
            tracing::warn!(error = %e, event_type = %event.event_type, "failed to write event");
        }
    }

    fn try_emit(&self, event: &Event) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        // One write call per line so concurrent writers interleave at
        // line granularity, never mid-record.
        file.write_all(format!("{line}\n").as_bytes())?;
        file.flush()
    }

    /// Read every parseable event, oldest first. Bad lines are skipped.
    pub fn read_all(&self) -> Vec<Event> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// The most recent `limit` events.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        let mut events = self.read_all();
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        events
    }

    pub fn by_type(&self, event_type: EventType) -> Vec<Event> {
        self.read_all().into_iter().filter(|e| e.event_type == event_type).collect()
    }

    pub fn by_issue(&self, issue_id: &str) -> Vec<Event> {
        self.read_all()
            .into_iter()
            .filter(|e| e.issue_id.as_deref() == Some(issue_id))
            .collect()
    }

    /// Aggregate statistics over the whole stream.
    pub fn stats(&self) -> EventStats {
        let events = self.read_all();

        let mut stats = EventStats { total_events: events.len() as u64, ..Default::default() };
        let mut durations: Vec<u64> = Vec::new();

        for event in &events {
            stats.total_tokens += event.tokens_used.unwrap_or(0);
            stats.total_cost_usd += event.cost_usd.unwrap_or(0.0);
            match event.event_type {
                EventType::IssueCompleted => {
                    stats.issues_completed += 1;
                    if let Some(ms) = event.duration_ms {
                        durations.push(ms);
                    }
                }
                EventType::IssueFailed => stats.issues_failed += 1,
                _ => {}
            }
        }

        if !durations.is_empty() {
            stats.avg_duration_ms = durations.iter().sum::<u64>() / durations.len() as u64;
        }
        let finished = stats.issues_completed + stats.issues_failed;
        if finished > 0 {
            stats.success_rate = stats.issues_completed as f64 / finished as f64;
        }
        stats
    }
}

/// Dashboard-style aggregates computed from the event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventStats {
    pub total_events: u64,
    pub issues_completed: u64,
    pub issues_failed: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub avg_duration_ms: u64,
    pub success_rate: f64,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
