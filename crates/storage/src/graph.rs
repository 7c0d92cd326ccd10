// SPDX-License-Identifier: MIT

//! State manager: the single writer for the work graph.
//!
//! The graph is stored as two append-only JSONL streams (issues, deps).
//! Later issue records override earlier ones by id, so a mutation is one
//! appended record. `compact()` rewrites the streams to one record per
//! entity. Reads materialize a consistent in-memory [`WorkGraph`];
//! per-record parse failures are logged and skipped so one bad line never
//! takes the orchestrator down.

use crate::events::EventLog;
use foreman_core::{
    time, Clock, Dep, DepType, Event, Issue, IssueStatus, Priority, Risk, Size, WorkGraph,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from graph store operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("issue not found: {0}")]
    NotFound(String),
    #[error("invalid status transition for issue {id}: {from} → {to}")]
    InvalidTransition { id: String, from: IssueStatus, to: IssueStatus },
    #[error("dependency {from} → {to} would create a blocks cycle")]
    CycleIntroduced { from: String, to: String },
    #[error("self-dependency is not allowed: {0}")]
    SelfDependency(String),
    #[error("unknown field in update: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Fields for creating a new issue.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub risk: Risk,
    pub size: Size,
    pub tags: Vec<String>,
    pub parent: Option<String>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    foreman_core::setters! {
        set {
            priority: Priority,
            risk: Risk,
            size: Size,
            tags: Vec<String>,
        }
        option {
            description: String,
            parent: String,
        }
    }
}

/// Reads and writes the issue+dep graph atomically.
///
/// The manager is the sole writer; all mutations serialize on one mutex
/// and the appended record is flushed before the call returns.
pub struct StateManager<C: Clock> {
    issues_path: PathBuf,
    deps_path: PathBuf,
    events: EventLog,
    clock: C,
    write_lock: Mutex<()>,
}

impl<C: Clock> StateManager<C> {
    pub fn new(graph_dir: impl Into<PathBuf>, events: EventLog, clock: C) -> Self {
        let graph_dir = graph_dir.into();
        Self {
            issues_path: graph_dir.join("issues.jsonl"),
            deps_path: graph_dir.join("deps.jsonl"),
            events,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Forward an event to the event log.
    pub fn add_event(&self, event: Event) {
        self.events.emit(&event);
    }

    /// Materialize the full graph.
    ///
    /// Issue records apply last-write-wins by id (insertion order is the
    /// first appearance). Dep records are deduplicated on (from, to, type);
    /// `blocks` records that would close a cycle are dropped with a warning.
    pub fn load_graph(&self) -> WorkGraph {
        let mut issues: IndexMap<String, Issue> = IndexMap::new();
        for issue in read_records::<Issue>(&self.issues_path) {
            if issue.id.is_empty() {
                tracing::warn!("skipping issue record with empty id");
                continue;
            }
            match issues.entry(issue.id.clone()) {
                indexmap::map::Entry::Occupied(mut slot) => {
                    *slot.get_mut() = issue;
                }
                indexmap::map::Entry::Vacant(slot) => {
                    slot.insert(issue);
                }
            }
        }

        let mut graph = WorkGraph::new(issues.into_values().collect(), Vec::new());
        let mut seen = std::collections::HashSet::new();
        for dep in read_records::<Dep>(&self.deps_path) {
            if dep.from_id.is_empty() || dep.to_id.is_empty() {
                tracing::warn!("skipping dep record with empty endpoint");
                continue;
            }
            let key = (dep.from_id.clone(), dep.to_id.clone(), dep.dep_type);
            if !seen.insert(key) {
                continue;
            }
            if dep.is_blocks() && graph.would_create_blocks_cycle(&dep.from_id, &dep.to_id) {
                tracing::warn!(
                    from = %dep.from_id,
                    to = %dep.to_id,
                    "dropping blocks dep that would form a cycle"
                );
                continue;
            }
            graph.deps.push(dep);
        }
        graph
    }

    /// Create a new issue with the next monotonic numeric id.
    pub fn create_issue(&self, new_issue: NewIssue) -> Result<String, GraphError> {
        let _guard = self.write_lock.lock();
        let graph = self.load_graph();
        let next_id = graph
            .issues
            .iter()
            .filter_map(|i| i.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = next_id.to_string();

        let mut issue = Issue::new(id.clone(), new_issue.title, self.clock.now());
        issue.description = new_issue.description;
        issue.dk_priority = new_issue.priority;
        issue.dk_risk = new_issue.risk;
        issue.dk_size = new_issue.size;
        issue.tags = new_issue.tags;
        issue.dk_parent = new_issue.parent;

        self.append(&self.issues_path, &issue)?;
        self.events.emit(
            &Event::new(foreman_core::EventType::IssueCreated, self.clock.now())
                .issue_id(id.clone())
                .datum("title", issue.title.clone()),
        );
        Ok(id)
    }

    /// Transition an issue's status, enforcing the state machine.
    pub fn update_issue_status(&self, id: &str, status: IssueStatus) -> Result<(), GraphError> {
        self.transition(id, status, false)
    }

    /// Human-override transition (manual escalation, re-queue, re-open).
    pub fn force_issue_status(&self, id: &str, status: IssueStatus) -> Result<(), GraphError> {
        self.transition(id, status, true)
    }

    fn transition(&self, id: &str, status: IssueStatus, forced: bool) -> Result<(), GraphError> {
        let _guard = self.write_lock.lock();
        let graph = self.load_graph();
        let mut issue = graph
            .get_issue(id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;

        if !forced && !issue.status.can_transition(status) {
            return Err(GraphError::InvalidTransition { id: id.to_string(), from: issue.status, to: status });
        }

        issue.status = status;
        issue.updated = self.clock.now();
        if status.is_schedulable() {
            if issue.ready_since.is_none() && graph.blockers_resolved(id) {
                issue.ready_since = Some(self.clock.now());
            }
        } else {
            issue.ready_since = None;
        }
        self.append(&self.issues_path, &issue)
    }

    /// Partial field update. Unknown fields fail; `dk_attempts` may not
    /// decrease or exceed `dk_max_attempts`; status changes go through the
    /// state machine.
    pub fn update_issue(
        &self,
        id: &str,
        fields: &serde_json::Map<String, Value>,
    ) -> Result<(), GraphError> {
        let _guard = self.write_lock.lock();
        let graph = self.load_graph();
        let mut issue = graph
            .get_issue(id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;

        for (field, value) in fields {
            apply_field(&mut issue, field, value)?;
        }
        issue.updated = self.clock.now();
        self.append(&self.issues_path, &issue)
    }

    /// Increment the attempt counter, saturating at max-attempts.
    /// Returns the new counter value.
    pub fn increment_attempts(&self, id: &str) -> Result<u32, GraphError> {
        let _guard = self.write_lock.lock();
        let graph = self.load_graph();
        let mut issue = graph
            .get_issue(id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;

        if issue.dk_attempts < issue.dk_max_attempts {
            issue.dk_attempts += 1;
            issue.updated = self.clock.now();
            self.append(&self.issues_path, &issue)?;
        }
        Ok(issue.dk_attempts)
    }

    /// Add a dependency edge. Idempotent on exact duplicates; rejects
    /// self-loops and `blocks` cycles. Returns false for duplicates.
    pub fn add_dep(&self, from: &str, to: &str, dep_type: DepType) -> Result<bool, GraphError> {
        let _guard = self.write_lock.lock();
        if from == to {
            return Err(GraphError::SelfDependency(from.to_string()));
        }

        let graph = self.load_graph();
        let duplicate = graph
            .deps
            .iter()
            .any(|d| d.from_id == from && d.to_id == to && d.dep_type == dep_type);
        if duplicate {
            return Ok(false);
        }
        if dep_type == DepType::Blocks && graph.would_create_blocks_cycle(from, to) {
            return Err(GraphError::CycleIntroduced { from: from.to_string(), to: to.to_string() });
        }

        let dep = Dep::new(from, to, dep_type, self.clock.now());
        self.append(&self.deps_path, &dep)?;
        Ok(true)
    }

    /// Issues whose status is schedulable, whose blockers are all done,
    /// and whose attempt budget remains.
    pub fn get_ready_issues(&self) -> Vec<Issue> {
        let graph = self.load_graph();
        graph
            .issues
            .iter()
            .filter(|i| i.status.is_schedulable())
            .filter(|i| i.can_attempt())
            .filter(|i| graph.blockers_resolved(&i.id))
            .cloned()
            .collect()
    }

    /// Stamp `ready_since` on issues whose blockers just became resolved.
    /// Returns how many issues were stamped.
    pub fn refresh_ready_since(&self) -> Result<usize, GraphError> {
        let _guard = self.write_lock.lock();
        let graph = self.load_graph();
        let now = self.clock.now();

        let newly_ready: Vec<Issue> = graph
            .issues
            .iter()
            .filter(|i| i.status.is_schedulable())
            .filter(|i| i.ready_since.is_none())
            .filter(|i| graph.blockers_resolved(&i.id))
            .cloned()
            .collect();

        let count = newly_ready.len();
        for mut issue in newly_ready {
            issue.ready_since = Some(now);
            issue.updated = now;
            self.append(&self.issues_path, &issue)?;
        }
        Ok(count)
    }

    /// Rewrite both streams with one record per entity (the compacted
    /// snapshot). Applied via temp-file + rename so readers never see a
    /// torn stream.
    pub fn compact(&self) -> Result<(), GraphError> {
        let _guard = self.write_lock.lock();
        let graph = self.load_graph();
        rewrite_records(&self.issues_path, &graph.issues)?;
        rewrite_records(&self.deps_path, &graph.deps)?;
        Ok(())
    }

    fn append<T: serde::Serialize>(&self, path: &Path, record: &T) -> Result<(), GraphError> {
        let io_err = |source| GraphError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let line = serde_json::to_string(record)?;
        let mut file =
            OpenOptions::new().create(true).append(true).open(path).map_err(io_err)?;
        file.write_all(format!("{line}\n").as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)
    }
}

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = n + 1, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

fn rewrite_records<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<(), GraphError> {
    let io_err = |source| GraphError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    let tmp = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp, out).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

fn invalid(field: &str, message: String) -> GraphError {
    GraphError::InvalidValue { field: field.to_string(), message }
}

fn parse<T: serde::de::DeserializeOwned>(field: &str, value: &Value) -> Result<T, GraphError> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(field, e.to_string()))
}

fn apply_field(issue: &mut Issue, field: &str, value: &Value) -> Result<(), GraphError> {
    match field {
        "title" => issue.title = parse(field, value)?,
        "description" => issue.description = parse(field, value)?,
        "tags" => issue.tags = parse(field, value)?,
        "acceptance_criteria" => issue.acceptance_criteria = parse(field, value)?,
        "context_files" => issue.context_files = parse(field, value)?,
        "status" => {
            let status: IssueStatus = parse(field, value)?;
            if !issue.status.can_transition(status) {
                return Err(GraphError::InvalidTransition {
                    id: issue.id.clone(),
                    from: issue.status,
                    to: status,
                });
            }
            issue.status = status;
            if !status.is_schedulable() {
                issue.ready_since = None;
            }
        }
        "dk_priority" => issue.dk_priority = parse(field, value)?,
        "dk_risk" => issue.dk_risk = parse(field, value)?,
        "dk_size" => issue.dk_size = parse(field, value)?,
        "dk_tool_hint" => issue.dk_tool_hint = parse(field, value)?,
        "dk_speculate" => issue.dk_speculate = parse(field, value)?,
        "dk_max_attempts" => issue.dk_max_attempts = parse(field, value)?,
        "dk_forbidden_paths" => issue.dk_forbidden_paths = parse(field, value)?,
        "dk_required_reviewers" => issue.dk_required_reviewers = parse(field, value)?,
        "dk_parent" => issue.dk_parent = parse(field, value)?,
        "dk_estimated_tokens" => issue.dk_estimated_tokens = parse(field, value)?,
        "dk_attempts" => {
            let attempts: u32 = parse(field, value)?;
            if attempts < issue.dk_attempts {
                return Err(invalid(field, "attempt counter never decreases".to_string()));
            }
            if attempts > issue.dk_max_attempts {
                return Err(invalid(
                    field,
                    format!("attempts ({attempts}) exceed max_attempts ({})", issue.dk_max_attempts),
                ));
            }
            issue.dk_attempts = attempts;
        }
        "ready_since" => {
            issue.ready_since = match value {
                Value::Null => None,
                Value::String(s) => Some(
                    time::parse_utc(s)
                        .ok_or_else(|| invalid(field, format!("unparseable timestamp {s:?}")))?,
                ),
                other => return Err(invalid(field, format!("expected timestamp, got {other}"))),
            }
        }
        unknown => return Err(GraphError::UnknownField(unknown.to_string())),
    }
    Ok(())
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
