// SPDX-License-Identifier: MIT

//! Scheduler: ready-set computation, critical-path ranking, starvation
//! prevention, lane packing, and the speculate decision.
//!
//! The scheduler is stateless across cycles; everything is re-derived
//! from the graph snapshot it is handed. It never mutates the graph —
//! starvation boosts apply to the cycle's working copies only.

use chrono::Duration;
use foreman_config::Config;
use foreman_core::{Clock, Issue, Priority, WorkGraph};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

/// Fallback token estimate for issues that carry none.
const DEFAULT_TOKEN_ESTIMATE: u64 = 50_000;
/// Past this wait an issue is forced to P0 and flagged starved.
const STARVED_FORCE_HOURS: i64 = 24;

/// Why a ready issue was not scheduled this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSlots,
    TokenLimit,
}

foreman_core::display_names! {
    SkipReason {
        NoSlots => "no_slots",
        TokenLimit => "token_limit",
    }
}

/// Result of a scheduling cycle.
#[derive(Debug, Clone, Default)]
pub struct SchedulePlan {
    pub ready: Vec<Issue>,
    pub critical_path: Vec<Issue>,
    pub scheduled: Vec<Issue>,
    /// Ids of scheduled issues that go to speculate mode.
    pub speculate: HashSet<String>,
    pub skipped: Vec<Issue>,
    pub reasons: HashMap<String, SkipReason>,
}

impl SchedulePlan {
    /// Total estimated tokens for the scheduled lanes.
    pub fn total_estimated_tokens(&self) -> u64 {
        self.scheduled.iter().map(|i| token_estimate(i)).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "Ready: {}, Scheduled: {}, Speculate: {}, Tokens: {}",
            self.ready.len(),
            self.scheduled.len(),
            self.speculate.len(),
            self.total_estimated_tokens()
        )
    }
}

fn token_estimate(issue: &Issue) -> u64 {
    if issue.dk_estimated_tokens == 0 {
        DEFAULT_TOKEN_ESTIMATE
    } else {
        issue.dk_estimated_tokens
    }
}

/// Produces a bounded plan of issues to start this cycle.
pub struct Scheduler<'a, C: Clock> {
    config: &'a Config,
    running: HashSet<String>,
    clock: C,
}

impl<'a, C: Clock> Scheduler<'a, C> {
    pub fn new(config: &'a Config, clock: C) -> Self {
        Self { config, running: HashSet::new(), clock }
    }

    /// Inject the ids currently being dispatched (published by the runner
    /// once per cycle).
    pub fn with_running(mut self, running: HashSet<String>) -> Self {
        self.running = running;
        self
    }

    /// Run a full scheduling cycle.
    pub fn schedule(&self, graph: &WorkGraph) -> SchedulePlan {
        let ready = self.compute_ready_set(graph);
        let critical_path = self.compute_critical_path(graph);
        let ready = self.prevent_starvation(ready);
        let (scheduled, skipped, reasons) = self.pack_lanes(&ready, &critical_path);
        let speculate = scheduled
            .iter()
            .filter(|i| self.should_speculate(i, &critical_path))
            .map(|i| i.id.clone())
            .collect();

        SchedulePlan { ready, critical_path, scheduled, speculate, skipped, reasons }
    }

    /// An issue is ready iff its status is open/ready, it is not already
    /// running, its attempt budget remains, and every blocker is done.
    pub fn compute_ready_set(&self, graph: &WorkGraph) -> Vec<Issue> {
        graph
            .issues
            .iter()
            .filter(|i| i.status.is_schedulable())
            .filter(|i| !self.running.contains(&i.id))
            .filter(|i| i.can_attempt())
            .filter(|i| graph.blockers_resolved(&i.id))
            .cloned()
            .collect()
    }

    /// Longest size-weighted chain through the `blocks` subgraph.
    ///
    /// Kahn topological sort, then a longest-path DP over the order, then
    /// backtracking from the max-distance node. Ties resolve to the
    /// earliest issue in graph insertion order.
    pub fn compute_critical_path(&self, graph: &WorkGraph) -> Vec<Issue> {
        if graph.issues.is_empty() {
            return Vec::new();
        }

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for issue in &graph.issues {
            in_degree.entry(issue.id.as_str()).or_insert(0);
        }
        for dep in graph.deps.iter().filter(|d| d.is_blocks()) {
            // Edges to unknown issues contribute nothing.
            if graph.get_issue(&dep.from_id).is_none() || graph.get_issue(&dep.to_id).is_none() {
                continue;
            }
            adjacency.entry(dep.from_id.as_str()).or_default().push(dep.to_id.as_str());
            *in_degree.entry(dep.to_id.as_str()).or_insert(0) += 1;
        }

        let mut queue: VecDeque<&Issue> =
            graph.issues.iter().filter(|i| in_degree[i.id.as_str()] == 0).collect();
        let mut topo_order: Vec<&Issue> = Vec::with_capacity(graph.issues.len());
        while let Some(node) = queue.pop_front() {
            topo_order.push(node);
            for neighbor_id in adjacency.get(node.id.as_str()).into_iter().flatten() {
                let Some(degree) = in_degree.get_mut(*neighbor_id) else { continue };
                *degree -= 1;
                if *degree == 0 {
                    if let Some(neighbor) = graph.get_issue(neighbor_id) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        if topo_order.is_empty() {
            return Vec::new();
        }

        let mut dist: HashMap<&str, u32> = graph
            .issues
            .iter()
            .map(|i| (i.id.as_str(), i.dk_size.weight()))
            .collect();
        let mut parent: HashMap<&str, Option<&str>> =
            graph.issues.iter().map(|i| (i.id.as_str(), None)).collect();

        for node in &topo_order {
            for neighbor_id in adjacency.get(node.id.as_str()).into_iter().flatten() {
                let Some(neighbor) = graph.get_issue(neighbor_id) else { continue };
                let candidate = dist[node.id.as_str()] + neighbor.dk_size.weight();
                if candidate > dist[*neighbor_id] {
                    dist.insert(*neighbor_id, candidate);
                    parent.insert(*neighbor_id, Some(node.id.as_str()));
                }
            }
        }

        // First strict maximum in insertion order.
        let mut end_id: &str = &graph.issues[0].id;
        for issue in &graph.issues {
            if dist[issue.id.as_str()] > dist[end_id] {
                end_id = &issue.id;
            }
        }

        let mut path = Vec::new();
        let mut current = Some(end_id);
        while let Some(id) = current {
            if let Some(issue) = graph.get_issue(id) {
                path.push(issue.clone());
            }
            current = parent.get(id).copied().flatten();
        }
        path.reverse();
        path
    }

    /// Boost issues that have waited past the starvation threshold; force
    /// P0 and flag past 24 hours. Sorts P0/starved first.
    pub fn prevent_starvation(&self, mut ready: Vec<Issue>) -> Vec<Issue> {
        let now = self.clock.now();
        let threshold = Duration::seconds((self.config.starvation_threshold_hours * 3600.0) as i64);

        for issue in &mut ready {
            let Some(ready_since) = issue.ready_since else { continue };
            let waited = now - ready_since;

            if waited > threshold {
                issue.dk_priority = issue.dk_priority.boosted();
            }
            if waited > Duration::hours(STARVED_FORCE_HOURS) {
                issue.dk_priority = Priority::P0;
                issue.dk_starved = true;
                tracing::info!(issue_id = %issue.id, waited_hours = waited.num_hours(), "issue starved");
            }
        }

        ready.sort_by_key(|i| (i.dk_priority, !i.dk_starved));
        ready
    }

    /// Pack ready issues into lanes bounded by workcell slots and the
    /// cycle token budget. Critical-path members go first, then the rest
    /// by (priority, risk descending).
    pub fn pack_lanes(
        &self,
        ready: &[Issue],
        critical_path: &[Issue],
    ) -> (Vec<Issue>, Vec<Issue>, HashMap<String, SkipReason>) {
        let mut lanes = Vec::new();
        let mut skipped = Vec::new();
        let mut reasons = HashMap::new();

        let mut remaining_slots = self.config.max_concurrent_workcells;
        let mut remaining_tokens = self.config.max_concurrent_tokens;

        let cp_ids: HashSet<&str> = critical_path.iter().map(|i| i.id.as_str()).collect();
        let cp_ready: Vec<&Issue> =
            ready.iter().filter(|i| cp_ids.contains(i.id.as_str())).collect();
        let mut other_ready: Vec<&Issue> =
            ready.iter().filter(|i| !cp_ids.contains(i.id.as_str())).collect();
        other_ready.sort_by_key(|i| (i.dk_priority, Reverse(i.dk_risk)));

        for issue in cp_ready.into_iter().chain(other_ready) {
            let estimate = token_estimate(issue);

            if remaining_slots == 0 {
                skipped.push(issue.clone());
                reasons.insert(issue.id.clone(), SkipReason::NoSlots);
                continue;
            }
            if remaining_tokens < estimate {
                skipped.push(issue.clone());
                reasons.insert(issue.id.clone(), SkipReason::TokenLimit);
                continue;
            }

            lanes.push(issue.clone());
            remaining_slots -= 1;
            remaining_tokens -= estimate;

            // Best-effort reservation for parallel speculate attempts.
            if self.should_speculate(issue, critical_path) && self.config.speculation.enabled {
                let extra = self.config.speculation.default_parallelism.saturating_sub(1);
                for _ in 0..extra {
                    if remaining_slots > 0 && remaining_tokens >= estimate {
                        remaining_slots -= 1;
                        remaining_tokens -= estimate;
                    }
                }
            }
        }

        (lanes, skipped, reasons)
    }

    /// Speculate iff speculation is enabled AND the issue asks for it, a
    /// global override forces it, or it sits on the critical path with an
    /// auto-trigger risk level.
    pub fn should_speculate(&self, issue: &Issue, critical_path: &[Issue]) -> bool {
        if !self.config.speculation.enabled {
            return false;
        }
        if issue.dk_speculate || self.config.force_speculate {
            return true;
        }
        if self.config.speculation.auto_trigger_on_critical_path
            && critical_path.iter().any(|i| i.id == issue.id)
            && self.config.speculation.auto_trigger_risk_levels.contains(&issue.dk_risk)
        {
            return true;
        }
        false
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
