// SPDX-License-Identifier: MIT

use super::*;
use foreman_core::FakeClock;
use std::io::Write as _;

struct Fixture {
    _dir: tempfile::TempDir,
    manager: StateManager<FakeClock>,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let events = EventLog::new(dir.path().join("logs/events.jsonl"));
    let manager = StateManager::new(dir.path().join("graph"), events, clock.clone());
    Fixture { _dir: dir, manager, clock }
}

fn seed_issue(fx: &Fixture, id: &str, status: IssueStatus) {
    let issue = Issue::builder().id(id).status(status).build();
    fx.manager.append(&fx.manager.issues_path.clone(), &issue).unwrap();
}

fn seed_dep(fx: &Fixture, from: &str, to: &str) {
    let dep = Dep::new(from, to, DepType::Blocks, fx.clock.now());
    fx.manager.append(&fx.manager.deps_path.clone(), &dep).unwrap();
}

#[test]
fn empty_store_loads_empty_graph() {
    let fx = fixture();
    let graph = fx.manager.load_graph();
    assert!(graph.issues.is_empty());
    assert!(graph.deps.is_empty());
}

#[test]
fn create_issue_assigns_monotonic_ids() {
    let fx = fixture();
    let first = fx.manager.create_issue(NewIssue::new("First")).unwrap();
    let second = fx.manager.create_issue(NewIssue::new("Second")).unwrap();

    assert_eq!(first, "1");
    assert_eq!(second, "2");

    let graph = fx.manager.load_graph();
    assert_eq!(graph.get_issue("1").unwrap().title, "First");
    assert_eq!(graph.get_issue("2").unwrap().status, IssueStatus::Open);
}

#[test]
fn create_issue_emits_event() {
    let fx = fixture();
    let id = fx.manager.create_issue(NewIssue::new("First")).unwrap();
    let events = fx.manager.events().by_type(foreman_core::EventType::IssueCreated);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].issue_id.as_deref(), Some(id.as_str()));
}

#[test]
fn later_records_override_earlier_by_id() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Open);
    seed_issue(&fx, "2", IssueStatus::Open);
    seed_issue(&fx, "1", IssueStatus::Done);

    let graph = fx.manager.load_graph();
    assert_eq!(graph.issues.len(), 2);
    assert_eq!(graph.get_issue("1").unwrap().status, IssueStatus::Done);
    // Insertion order is first appearance.
    assert_eq!(graph.issues[0].id, "1");
}

#[test]
fn malformed_records_are_skipped() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Open);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&fx.manager.issues_path)
        .unwrap();
    writeln!(file, "{{truncated").unwrap();
    drop(file);
    seed_issue(&fx, "2", IssueStatus::Open);

    let graph = fx.manager.load_graph();
    assert_eq!(graph.issues.len(), 2);
}

#[test]
fn cycle_forming_dep_records_are_dropped_at_load() {
    let fx = fixture();
    seed_issue(&fx, "a", IssueStatus::Open);
    seed_issue(&fx, "b", IssueStatus::Open);
    seed_dep(&fx, "a", "b");
    seed_dep(&fx, "b", "a"); // closes the cycle on disk

    let graph = fx.manager.load_graph();
    assert_eq!(graph.deps.len(), 1);
    assert_eq!(graph.deps[0].from_id, "a");
}

#[test]
fn status_transitions_follow_the_machine() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Open);

    fx.manager.update_issue_status("1", IssueStatus::Running).unwrap();
    fx.manager.update_issue_status("1", IssueStatus::Done).unwrap();

    let err = fx.manager.update_issue_status("1", IssueStatus::Ready).unwrap_err();
    assert!(matches!(err, GraphError::InvalidTransition { .. }));
}

#[test]
fn forced_transition_bypasses_the_machine() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Done);
    fx.manager.force_issue_status("1", IssueStatus::Ready).unwrap();
    assert_eq!(fx.manager.load_graph().get_issue("1").unwrap().status, IssueStatus::Ready);
}

#[test]
fn transition_to_running_clears_ready_since() {
    let fx = fixture();
    let issue = Issue::builder().id("1").status(IssueStatus::Ready).ready_since(fx.clock.now()).build();
    fx.manager.append(&fx.manager.issues_path.clone(), &issue).unwrap();

    fx.manager.update_issue_status("1", IssueStatus::Running).unwrap();
    assert!(fx.manager.load_graph().get_issue("1").unwrap().ready_since.is_none());
}

#[test]
fn update_unknown_field_fails() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Open);

    let mut fields = serde_json::Map::new();
    fields.insert("dk_bogus".to_string(), serde_json::json!(1));
    let err = fx.manager.update_issue("1", &fields).unwrap_err();
    assert!(matches!(err, GraphError::UnknownField(f) if f == "dk_bogus"));
}

#[test]
fn update_known_fields() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Open);

    let mut fields = serde_json::Map::new();
    fields.insert("title".to_string(), serde_json::json!("Renamed"));
    fields.insert("dk_priority".to_string(), serde_json::json!("P0"));
    fields.insert("dk_forbidden_paths".to_string(), serde_json::json!(["migrations/"]));
    fx.manager.update_issue("1", &fields).unwrap();

    let issue = fx.manager.load_graph().get_issue("1").unwrap().clone();
    assert_eq!(issue.title, "Renamed");
    assert_eq!(issue.dk_priority, Priority::P0);
    assert_eq!(issue.dk_forbidden_paths, vec!["migrations/"]);
}

#[test]
fn attempts_never_decrease_nor_exceed_max() {
    let fx = fixture();
    let issue = Issue::builder().id("1").dk_attempts(2).dk_max_attempts(3).build();
    fx.manager.append(&fx.manager.issues_path.clone(), &issue).unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("dk_attempts".to_string(), serde_json::json!(1));
    assert!(fx.manager.update_issue("1", &fields).is_err());

    fields.insert("dk_attempts".to_string(), serde_json::json!(4));
    assert!(fx.manager.update_issue("1", &fields).is_err());

    fields.insert("dk_attempts".to_string(), serde_json::json!(3));
    fx.manager.update_issue("1", &fields).unwrap();
}

#[test]
fn increment_attempts_saturates_at_max() {
    let fx = fixture();
    let issue = Issue::builder().id("1").dk_attempts(2).dk_max_attempts(3).build();
    fx.manager.append(&fx.manager.issues_path.clone(), &issue).unwrap();

    assert_eq!(fx.manager.increment_attempts("1").unwrap(), 3);
    assert_eq!(fx.manager.increment_attempts("1").unwrap(), 3);
}

#[test]
fn add_dep_rejects_self_loop_and_cycles() {
    let fx = fixture();
    seed_issue(&fx, "a", IssueStatus::Open);
    seed_issue(&fx, "b", IssueStatus::Open);

    assert!(matches!(
        fx.manager.add_dep("a", "a", DepType::Blocks),
        Err(GraphError::SelfDependency(_))
    ));

    assert!(fx.manager.add_dep("a", "b", DepType::Blocks).unwrap());
    assert!(matches!(
        fx.manager.add_dep("b", "a", DepType::Blocks),
        Err(GraphError::CycleIntroduced { .. })
    ));

    // Non-blocks edges are exempt from cycle checks.
    assert!(fx.manager.add_dep("b", "a", DepType::Discovered).unwrap());
}

#[test]
fn add_dep_is_idempotent_on_duplicates() {
    let fx = fixture();
    assert!(fx.manager.add_dep("a", "b", DepType::Blocks).unwrap());
    assert!(!fx.manager.add_dep("a", "b", DepType::Blocks).unwrap());
    assert_eq!(fx.manager.load_graph().deps.len(), 1);
}

#[test]
fn ready_issues_respect_blockers_and_attempts() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Done);
    seed_issue(&fx, "2", IssueStatus::Open);
    seed_issue(&fx, "3", IssueStatus::Open);
    seed_dep(&fx, "1", "2"); // resolved blocker
    seed_dep(&fx, "2", "3"); // unresolved blocker

    let exhausted = Issue::builder().id("4").dk_attempts(3).dk_max_attempts(3).build();
    fx.manager.append(&fx.manager.issues_path.clone(), &exhausted).unwrap();

    let ready: Vec<String> = fx.manager.get_ready_issues().into_iter().map(|i| i.id).collect();
    assert_eq!(ready, vec!["2"]);
}

#[test]
fn refresh_ready_since_stamps_once() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Done);
    seed_issue(&fx, "2", IssueStatus::Open);
    seed_dep(&fx, "1", "2");

    assert_eq!(fx.manager.refresh_ready_since().unwrap(), 1);
    let stamped = fx.manager.load_graph().get_issue("2").unwrap().ready_since;
    assert_eq!(stamped, Some(fx.clock.now()));

    // Second pass is a no-op.
    fx.clock.advance(chrono::Duration::hours(1));
    assert_eq!(fx.manager.refresh_ready_since().unwrap(), 0);
    assert_eq!(fx.manager.load_graph().get_issue("2").unwrap().ready_since, stamped);
}

#[test]
fn compact_rewrites_one_record_per_entity() {
    let fx = fixture();
    seed_issue(&fx, "1", IssueStatus::Open);
    fx.manager.update_issue_status("1", IssueStatus::Running).unwrap();
    fx.manager.update_issue_status("1", IssueStatus::Done).unwrap();
    fx.manager.add_dep("1", "2", DepType::Blocks).unwrap();

    fx.manager.compact().unwrap();

    let issue_lines =
        std::fs::read_to_string(&fx.manager.issues_path).unwrap().lines().count();
    assert_eq!(issue_lines, 1);
    assert_eq!(fx.manager.load_graph().get_issue("1").unwrap().status, IssueStatus::Done);
}

#[test]
fn records_are_iso8601_utc_on_disk() {
    let fx = fixture();
    fx.manager.create_issue(NewIssue::new("x")).unwrap();
    let raw = std::fs::read_to_string(&fx.manager.issues_path).unwrap();
    let record: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert!(record["created"].as_str().unwrap().ends_with('Z'));
}
