// SPDX-License-Identifier: MIT

//! Runner loop: schedule → dispatch (parallel) → record → sleep or exit.
//!
//! The runner owns the running-task set and publishes it to the scheduler
//! once per cycle. Dispatch failures are normal control flow; the loop
//! only ends on `--once`, an empty backlog in single-cycle mode, or
//! shutdown.

use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::scheduler::Scheduler;
use foreman_adapters::NotifyAdapter;
use foreman_config::Config;
use foreman_core::{Clock, Event, EventType, Issue};
use foreman_storage::StateManager;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How long in-flight dispatches may run after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Options for one runner invocation.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Process one cycle and exit.
    pub once: bool,
    /// Restrict scheduling to a single issue id.
    pub target_issue: Option<String>,
}

/// Counters reported when the runner stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Orchestrates cycles over the graph.
pub struct KernelRunner<C: Clock, N: NotifyAdapter> {
    config: Arc<Config>,
    state: Arc<StateManager<C>>,
    dispatcher: Arc<Dispatcher<C, N>>,
    clock: C,
    options: RunnerOptions,
    shutdown: CancellationToken,
    running: Arc<Mutex<HashSet<String>>>,
}

impl<C: Clock, N: NotifyAdapter> KernelRunner<C, N> {
    pub fn new(
        config: Arc<Config>,
        state: Arc<StateManager<C>>,
        dispatcher: Arc<Dispatcher<C, N>>,
        clock: C,
        options: RunnerOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            dispatcher,
            clock,
            options,
            shutdown,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run cycles until done or shut down. Returns aggregate counters.
    pub async fn run(&self) -> RunSummary {
        let events = self.state.events().clone();
        events.emit(
            &Event::new(EventType::KernelStarted, self.clock.now())
                .datum("max_concurrent_workcells", self.config.max_concurrent_workcells as u64)
                .datum(
                    "toolchain_priority",
                    self.config.toolchain_priority.clone(),
                ),
        );

        let mut summary = RunSummary::default();
        loop {
            summary.cycles += 1;
            let (dispatched, completed, failed) = self.run_cycle(summary.cycles).await;
            summary.dispatched += dispatched;
            summary.completed += completed;
            summary.failed += failed;

            if self.options.once || self.shutdown.is_cancelled() {
                break;
            }

            let sleep = Duration::from_secs(self.config.poll_interval_seconds.max(1));
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        if let Err(e) = self.state.compact() {
            tracing::warn!(error = %e, "failed to compact graph store on shutdown");
        }
        let stats = self.state.events().stats();
        events.emit(
            &Event::new(EventType::KernelStopped, self.clock.now())
                .datum("cycles", summary.cycles)
                .datum("issues_completed", stats.issues_completed)
                .datum("issues_failed", stats.issues_failed),
        );
        summary
    }

    /// One cycle: refresh readiness, schedule, dispatch in parallel,
    /// collect. Returns (dispatched, completed, failed).
    async fn run_cycle(&self, cycle: u64) -> (u64, u64, u64) {
        let events = self.state.events().clone();
        events.emit(
            &Event::new(EventType::CycleStarted, self.clock.now()).datum("cycle", cycle),
        );

        if let Err(e) = self.state.refresh_ready_since() {
            tracing::warn!(error = %e, "ready-since refresh failed");
        }

        let graph = self.state.load_graph();
        let running = self.running.lock().clone();
        let plan = Scheduler::new(&self.config, self.clock.clone())
            .with_running(running)
            .schedule(&graph);

        events.emit(
            &Event::new(EventType::ScheduleComputed, self.clock.now())
                .datum("ready", plan.ready.len() as u64)
                .datum("scheduled", plan.scheduled.len() as u64)
                .datum("speculate", plan.speculate.len() as u64)
                .datum("estimated_tokens", plan.total_estimated_tokens()),
        );
        for issue in &plan.skipped {
            let reason =
                plan.reasons.get(&issue.id).map(|r| r.to_string()).unwrap_or_default();
            events.emit(
                &Event::new(EventType::IssueSkipped, self.clock.now())
                    .issue_id(issue.id.clone())
                    .datum("reason", reason),
            );
        }

        let scheduled: Vec<Issue> = plan
            .scheduled
            .into_iter()
            .filter(|i| {
                self.options.target_issue.as_ref().map_or(true, |target| &i.id == target)
            })
            .collect();
        tracing::info!(cycle, scheduled = scheduled.len(), "cycle planned");

        if self.config.dry_run {
            for issue in &scheduled {
                tracing::info!(
                    issue_id = %issue.id,
                    speculate = plan.speculate.contains(&issue.id),
                    "dry-run: would dispatch"
                );
            }
            return (0, 0, 0);
        }

        let mut join_set: JoinSet<DispatchResult> = JoinSet::new();
        let mut dispatched = 0u64;
        for issue in scheduled {
            if self.shutdown.is_cancelled() {
                break;
            }
            let speculate = plan.speculate.contains(&issue.id);
            events.emit(
                &Event::new(EventType::IssueScheduled, self.clock.now())
                    .issue_id(issue.id.clone())
                    .datum("speculate", speculate),
            );

            self.running.lock().insert(issue.id.clone());
            let dispatcher = self.dispatcher.clone();
            dispatched += 1;
            join_set.spawn(async move { dispatcher.dispatch(&issue, speculate).await });
        }

        let (completed, failed) = self.collect(&mut join_set).await;
        events.emit(
            &Event::new(EventType::CycleCompleted, self.clock.now())
                .datum("cycle", cycle)
                .datum("scheduled", dispatched)
                .datum("completed", completed)
                .datum("failed", failed),
        );
        (dispatched, completed, failed)
    }

    /// Wait for in-flight dispatches. After a shutdown signal, tasks get
    /// a grace period and are then aborted.
    async fn collect(&self, join_set: &mut JoinSet<DispatchResult>) -> (u64, u64) {
        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut record = |result: Result<DispatchResult, tokio::task::JoinError>| match result {
            Ok(result) => {
                self.running.lock().remove(&result.issue_id);
                if result.success {
                    completed += 1;
                } else {
                    failed += 1;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "dispatch task panicked or was aborted");
                self.state.events().emit(
                    &Event::new(EventType::Error, self.clock.now())
                        .datum("message", "dispatch task panicked or was aborted")
                        .datum("detail", e.to_string()),
                );
                failed += 1;
            }
        };

        loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    match joined {
                        Some(result) => record(result),
                        None => break,
                    }
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!(
                        in_flight = join_set.len(),
                        grace_s = SHUTDOWN_GRACE.as_secs(),
                        "shutdown requested, draining in-flight dispatches"
                    );
                    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
                        while let Some(result) = join_set.join_next().await {
                            record(result);
                        }
                    })
                    .await;
                    if drained.is_err() {
                        tracing::warn!("grace period expired, aborting dispatches");
                        join_set.abort_all();
                        while let Some(result) = join_set.join_next().await {
                            record(result);
                        }
                    }
                    break;
                }
            }
        }

        // Any ids left in the running set belong to aborted tasks.
        self.running.lock().clear();
        (completed, failed)
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
