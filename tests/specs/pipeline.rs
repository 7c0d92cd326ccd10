// SPDX-License-Identifier: MIT

//! Full pipeline specs: schedule → dispatch → verify → record, against a
//! real git repository with a fake toolchain adapter.

use super::support;
use foreman_adapters::{AdapterRegistry, FakeAdapter, FakeNotifyAdapter};
use foreman_core::{DepType, EventType, FakeClock, IssueStatus, Outcome, PatchProof};
use foreman_engine::{Dispatcher, KernelRunner, RunnerOptions, Verifier, WorkcellManager};
use foreman_storage::{FlakyStore, NewIssue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Harness {
    _dir: tempfile::TempDir,
    config: Arc<foreman_config::Config>,
    state: Arc<foreman_storage::StateManager<FakeClock>>,
    adapter: FakeAdapter,
    clock: FakeClock,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = support::init_repo(dir.path());
        let clock = FakeClock::new();
        let state = support::state_manager(&config, clock.clone());
        Self { _dir: dir, config, state, adapter: FakeAdapter::new("fake"), clock }
    }

    fn runner(&self) -> KernelRunner<FakeClock, FakeNotifyAdapter> {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(self.adapter.clone()));

        let flaky = Arc::new(FlakyStore::new(self.config.flaky_file()));
        let verifier =
            Verifier::new(self.config.clone(), flaky, self.state.events().clone());
        let dispatcher = Arc::new(Dispatcher::new(
            self.config.clone(),
            self.state.clone(),
            Arc::new(registry),
            Arc::new(WorkcellManager::new(&self.config)),
            verifier,
            FakeNotifyAdapter::new(),
            self.clock.clone(),
        ));
        KernelRunner::new(
            self.config.clone(),
            self.state.clone(),
            dispatcher,
            self.clock.clone(),
            RunnerOptions { once: true, ..Default::default() },
            CancellationToken::new(),
        )
    }

    fn status(&self, id: &str) -> IssueStatus {
        self.state.load_graph().get_issue(id).unwrap().status
    }
}

#[tokio::test]
async fn backlog_drains_through_cycles_respecting_dependencies() {
    let harness = Harness::new();
    let state = &harness.state;

    let model = state.create_issue(NewIssue::new("Create user model")).unwrap();
    let login = state.create_issue(NewIssue::new("Add login endpoint")).unwrap();
    let tests = state.create_issue(NewIssue::new("Write auth tests")).unwrap();
    state.add_dep(&model, &login, DepType::Blocks).unwrap();
    state.add_dep(&login, &tests, DepType::Blocks).unwrap();

    // Cycle 1: only the unblocked root is dispatched.
    let summary = harness.runner().run().await;
    assert_eq!(summary.dispatched, 1);
    assert_eq!(harness.status(&model), IssueStatus::Done);
    assert_eq!(harness.status(&login), IssueStatus::Open);

    // Cycle 2 and 3 drain the chain in dependency order.
    harness.runner().run().await;
    assert_eq!(harness.status(&login), IssueStatus::Done);
    harness.runner().run().await;
    assert_eq!(harness.status(&tests), IssueStatus::Done);

    // Nothing is left; an extra cycle schedules zero lanes.
    let summary = harness.runner().run().await;
    assert_eq!(summary.dispatched, 0);
}

#[tokio::test]
async fn workcells_are_archived_and_removed_after_dispatch() {
    let harness = Harness::new();
    let id = harness.state.create_issue(NewIssue::new("Touch something")).unwrap();

    harness.runner().run().await;
    assert_eq!(harness.status(&id), IssueStatus::Done);

    // No live workcells remain.
    let leftover: Vec<_> = std::fs::read_dir(harness.config.workcells_dir())
        .unwrap()
        .flatten()
        .filter(|e| e.path().is_dir())
        .collect();
    assert!(leftover.is_empty(), "live workcells left behind: {leftover:?}");

    // The archive holds marker, manifest, proof, and the logs tree.
    let archives: Vec<_> =
        std::fs::read_dir(harness.config.archives_dir()).unwrap().flatten().collect();
    assert_eq!(archives.len(), 1);
    let archive = archives[0].path();
    for artifact in [".workcell", "manifest.json", "proof.json"] {
        assert!(archive.join(artifact).exists(), "missing {artifact}");
    }
    assert!(archive.join("logs/test.log").exists());
}

#[tokio::test]
async fn event_stream_tells_the_whole_story() {
    let harness = Harness::new();
    harness.state.create_issue(NewIssue::new("One task")).unwrap();

    harness.runner().run().await;

    let events = harness.state.events();
    for event_type in [
        EventType::KernelStarted,
        EventType::CycleStarted,
        EventType::ScheduleComputed,
        EventType::IssueScheduled,
        EventType::IssueStarted,
        EventType::WorkcellCreated,
        EventType::WorkcellStarted,
        EventType::GatesStarted,
        EventType::GatesPassed,
        EventType::WorkcellCompleted,
        EventType::IssueCompleted,
        EventType::CycleCompleted,
        EventType::KernelStopped,
    ] {
        assert!(
            !events.by_type(event_type).is_empty(),
            "event stream missing {event_type}"
        );
    }

    // Every line in the stream is valid JSON with an ISO-8601 Z timestamp.
    let raw = std::fs::read_to_string(harness.config.events_file()).unwrap();
    for line in raw.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

#[tokio::test]
async fn failing_issue_retries_until_escalation() {
    let harness = Harness::new();
    let id = harness.state.create_issue(NewIssue::new("Doomed")).unwrap();
    let mut fields = serde_json::Map::new();
    fields.insert("dk_max_attempts".to_string(), serde_json::json!(2));
    harness.state.update_issue(&id, &fields).unwrap();

    // Fail every attempt.
    for _ in 0..2 {
        harness
            .adapter
            .push_proof(PatchProof::new("x", &id, Outcome::Failed));
    }

    harness.runner().run().await;
    assert_eq!(harness.status(&id), IssueStatus::Ready, "first failure re-queues");

    harness.runner().run().await;
    assert_eq!(harness.status(&id), IssueStatus::Escalated, "second failure exhausts attempts");

    let graph = harness.state.load_graph();
    let issue = graph.get_issue(&id).unwrap();
    assert_eq!(issue.dk_attempts, 2);
    assert!(issue.dk_attempts <= issue.dk_max_attempts);
}

#[tokio::test]
async fn compaction_on_shutdown_leaves_one_record_per_issue() {
    let harness = Harness::new();
    let id = harness.state.create_issue(NewIssue::new("Task")).unwrap();

    harness.runner().run().await;

    let raw =
        std::fs::read_to_string(harness.config.graph_dir().join("issues.jsonl")).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 1, "graph store not compacted: {lines:?}");
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["id"], serde_json::Value::String(id));
    assert_eq!(record["status"], "done");
}
