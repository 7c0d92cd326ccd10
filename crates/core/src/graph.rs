// SPDX-License-Identifier: MIT

//! The work graph: issues plus dependency edges, with readiness and
//! cycle queries. The graph is a value type; the storage crate owns
//! loading and mutation.

use crate::dep::{Dep, DepType};
use crate::issue::{Issue, IssueStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The full work graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkGraph {
    pub issues: Vec<Issue>,
    pub deps: Vec<Dep>,
}

impl WorkGraph {
    pub fn new(issues: Vec<Issue>, deps: Vec<Dep>) -> Self {
        Self { issues, deps }
    }

    pub fn get_issue(&self, id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    pub fn get_issue_mut(&mut self, id: &str) -> Option<&mut Issue> {
        self.issues.iter_mut().find(|i| i.id == id)
    }

    /// Deps touching an issue, optionally filtered by type.
    pub fn deps_for(&self, issue_id: &str, dep_type: Option<DepType>) -> Vec<&Dep> {
        self.deps
            .iter()
            .filter(|d| d.from_id == issue_id || d.to_id == issue_id)
            .filter(|d| dep_type.map_or(true, |t| d.dep_type == t))
            .collect()
    }

    /// Issues that block `issue_id` (via `blocks` edges pointing at it).
    pub fn blocking_deps(&self, issue_id: &str) -> Vec<&Issue> {
        self.deps
            .iter()
            .filter(|d| d.is_blocks() && d.to_id == issue_id)
            .filter_map(|d| self.get_issue(&d.from_id))
            .collect()
    }

    /// Issues blocked by `issue_id`.
    pub fn blocked_by(&self, issue_id: &str) -> Vec<&Issue> {
        self.deps
            .iter()
            .filter(|d| d.is_blocks() && d.from_id == issue_id)
            .filter_map(|d| self.get_issue(&d.to_id))
            .collect()
    }

    /// Whether every blocker of `issue_id` is done.
    pub fn blockers_resolved(&self, issue_id: &str) -> bool {
        self.blocking_deps(issue_id).iter().all(|b| b.status == IssueStatus::Done)
    }

    /// Whether adding a `blocks` edge from → to would introduce a cycle.
    ///
    /// True when `from` is already reachable from `to` along `blocks` edges
    /// (including the degenerate self-loop case).
    pub fn would_create_blocks_cycle(&self, from_id: &str, to_id: &str) -> bool {
        if from_id == to_id {
            return true;
        }

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in self.deps.iter().filter(|d| d.is_blocks()) {
            adjacency.entry(dep.from_id.as_str()).or_default().push(dep.to_id.as_str());
        }

        let mut stack = vec![to_id];
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == from_id {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = adjacency.get(node) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// Filter to the named issue plus its direct blockers and blockees.
    pub fn filter_to_issue(&self, issue_id: &str) -> WorkGraph {
        if self.get_issue(issue_id).is_none() {
            return WorkGraph::default();
        }

        let mut related: HashSet<&str> = HashSet::from([issue_id]);
        related.extend(self.blocking_deps(issue_id).iter().map(|i| i.id.as_str()));
        related.extend(self.blocked_by(issue_id).iter().map(|i| i.id.as_str()));

        WorkGraph {
            issues: self.issues.iter().filter(|i| related.contains(i.id.as_str())).cloned().collect(),
            deps: self
                .deps
                .iter()
                .filter(|d| related.contains(d.from_id.as_str()) && related.contains(d.to_id.as_str()))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
