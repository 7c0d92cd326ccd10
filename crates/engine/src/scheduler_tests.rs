// SPDX-License-Identifier: MIT

use super::*;
use foreman_core::{Dep, DepType, FakeClock, IssueStatus, Risk, Size};

fn config() -> Config {
    Config::default()
}

fn issue(id: &str) -> Issue {
    Issue::builder().id(id).title(format!("Issue {id}")).build()
}

fn sized(id: &str, size: Size) -> Issue {
    Issue::builder().id(id).dk_size(size).build()
}

fn blocks(from: &str, to: &str) -> Dep {
    Dep::new(from, to, DepType::Blocks, chrono::Utc::now())
}

fn scheduler(config: &Config) -> Scheduler<'_, FakeClock> {
    Scheduler::new(config, FakeClock::new())
}

fn ids(issues: &[Issue]) -> Vec<&str> {
    issues.iter().map(|i| i.id.as_str()).collect()
}

mod ready_set {
    use super::*;

    #[test]
    fn open_issues_with_no_deps_are_ready() {
        let config = config();
        let graph = WorkGraph::new(vec![issue("1"), issue("2")], vec![]);
        let ready = scheduler(&config).compute_ready_set(&graph);
        assert_eq!(ids(&ready), ["1", "2"]);
    }

    #[test]
    fn done_issues_are_not_ready() {
        let config = config();
        let done = Issue::builder().id("1").status(IssueStatus::Done).build();
        let graph = WorkGraph::new(vec![done, issue("2")], vec![]);
        assert_eq!(ids(&scheduler(&config).compute_ready_set(&graph)), ["2"]);
    }

    #[test]
    fn pending_blockers_hold_issues_back() {
        let config = config();
        let graph = WorkGraph::new(vec![issue("1"), issue("2")], vec![blocks("1", "2")]);
        assert_eq!(ids(&scheduler(&config).compute_ready_set(&graph)), ["1"]);
    }

    // A done blocker unblocks its dependent.
    #[test]
    fn done_blocker_unblocks() {
        let config = config();
        let done = Issue::builder().id("1").status(IssueStatus::Done).build();
        let graph = WorkGraph::new(vec![done, issue("2")], vec![blocks("1", "2")]);
        assert_eq!(ids(&scheduler(&config).compute_ready_set(&graph)), ["2"]);
    }

    #[test]
    fn running_tasks_are_excluded() {
        let config = config();
        let graph = WorkGraph::new(vec![issue("1"), issue("2")], vec![]);
        let sched = scheduler(&config).with_running(["1".to_string()].into());
        assert_eq!(ids(&sched.compute_ready_set(&graph)), ["2"]);
    }

    #[test]
    fn exhausted_attempts_are_excluded() {
        let config = config();
        let spent = Issue::builder().id("1").dk_attempts(3).dk_max_attempts(3).build();
        let graph = WorkGraph::new(vec![spent], vec![]);
        assert!(scheduler(&config).compute_ready_set(&graph).is_empty());
    }
}

mod critical_path {
    use super::*;

    #[test]
    fn single_issue_is_its_own_path() {
        let config = config();
        let graph = WorkGraph::new(vec![issue("1")], vec![]);
        assert_eq!(ids(&scheduler(&config).compute_critical_path(&graph)), ["1"]);
    }

    #[test]
    fn empty_graph_is_empty_path() {
        let config = config();
        assert!(scheduler(&config).compute_critical_path(&WorkGraph::default()).is_empty());
    }

    #[test]
    fn linear_chain_is_returned_in_order() {
        let config = config();
        let graph = WorkGraph::new(
            vec![issue("1"), issue("2"), issue("3")],
            vec![blocks("1", "2"), blocks("2", "3")],
        );
        assert_eq!(ids(&scheduler(&config).compute_critical_path(&graph)), ["1", "2", "3"]);
    }

    #[test]
    fn longest_chain_wins() {
        let config = config();
        let graph = WorkGraph::new(
            vec![issue("1"), issue("2"), issue("3"), issue("4"), issue("5")],
            vec![blocks("1", "2"), blocks("3", "4"), blocks("4", "5")],
        );
        assert_eq!(ids(&scheduler(&config).compute_critical_path(&graph)), ["3", "4", "5"]);
    }

    // XL+XS (17) outweighs S+S+S (6) despite being shorter.
    #[test]
    fn weight_beats_length() {
        let config = config();
        let graph = WorkGraph::new(
            vec![
                sized("A", Size::XL),
                sized("B", Size::XS),
                sized("C", Size::S),
                sized("D", Size::S),
                sized("E", Size::S),
            ],
            vec![blocks("A", "B"), blocks("C", "D"), blocks("D", "E")],
        );
        assert_eq!(ids(&scheduler(&config).compute_critical_path(&graph)), ["A", "B"]);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let config = config();
        // Two disjoint chains of identical weight; the one whose end node
        // appears first in the issue list wins.
        let graph = WorkGraph::new(
            vec![sized("a1", Size::M), sized("a2", Size::M), sized("b1", Size::M), sized("b2", Size::M)],
            vec![blocks("a1", "a2"), blocks("b1", "b2")],
        );
        assert_eq!(ids(&scheduler(&config).compute_critical_path(&graph)), ["a1", "a2"]);
    }
}

mod starvation {
    use super::*;

    // A P3 issue ready for 25h becomes P0, flagged, and sorts first.
    #[test]
    fn long_wait_forces_p0_and_flag() {
        let config = config();
        let clock = FakeClock::new();
        let stale = clock.now() - chrono::Duration::hours(25);
        let starving = Issue::builder().id("1").dk_priority(Priority::P3).ready_since(stale).build();
        let fresh = Issue::builder().id("2").dk_priority(Priority::P1).build();

        let sched = Scheduler::new(&config, clock);
        let ready = sched.prevent_starvation(vec![fresh, starving]);

        assert_eq!(ready[0].id, "1");
        assert_eq!(ready[0].dk_priority, Priority::P0);
        assert!(ready[0].dk_starved);
    }

    #[test]
    fn threshold_wait_boosts_one_step() {
        let config = config();
        let clock = FakeClock::new();
        let waited = clock.now() - chrono::Duration::hours(5);
        let issue = Issue::builder().id("1").dk_priority(Priority::P2).ready_since(waited).build();

        let ready = Scheduler::new(&config, clock).prevent_starvation(vec![issue]);
        assert_eq!(ready[0].dk_priority, Priority::P1);
        assert!(!ready[0].dk_starved);
    }

    #[test]
    fn fresh_issues_are_untouched() {
        let config = config();
        let clock = FakeClock::new();
        let issue = Issue::builder().id("1").dk_priority(Priority::P3).ready_since(clock.now()).build();
        let ready = Scheduler::new(&config, clock).prevent_starvation(vec![issue]);
        assert_eq!(ready[0].dk_priority, Priority::P3);
    }

    #[test]
    fn no_ready_since_means_no_boost() {
        let config = config();
        let ready = scheduler(&config).prevent_starvation(vec![issue("1")]);
        assert_eq!(ready[0].dk_priority, Priority::P2);
    }
}

mod lane_packing {
    use super::*;

    #[test]
    fn respects_slot_limit() {
        let mut config = config();
        config.max_concurrent_workcells = 2;
        let ready: Vec<Issue> = (0..5).map(|i| issue(&i.to_string())).collect();

        let (lanes, skipped, reasons) = scheduler(&config).pack_lanes(&ready, &[]);
        assert_eq!(lanes.len(), 2);
        assert_eq!(skipped.len(), 3);
        assert!(skipped.iter().all(|i| reasons[&i.id] == SkipReason::NoSlots));
    }

    #[test]
    fn respects_token_budget() {
        let mut config = config();
        config.max_concurrent_tokens = 100_000;
        let ready: Vec<Issue> =
            (0..5).map(|i| Issue::builder().id(i.to_string()).dk_estimated_tokens(40_000).build()).collect();

        let (lanes, skipped, reasons) = scheduler(&config).pack_lanes(&ready, &[]);
        assert_eq!(lanes.len(), 2); // 2 × 40k fits in 100k
        assert_eq!(skipped.len(), 3);
        assert!(skipped.iter().all(|i| reasons[&i.id] == SkipReason::TokenLimit));
    }

    #[test]
    fn critical_path_members_go_first() {
        let mut config = config();
        config.max_concurrent_workcells = 1;
        let ready = vec![issue("1"), issue("2"), issue("3")];
        let critical = vec![issue("3")];

        let (lanes, _, _) = scheduler(&config).pack_lanes(&ready, &critical);
        assert_eq!(lanes[0].id, "3");
    }

    #[test]
    fn others_sorted_by_priority_then_risk_desc() {
        let config = config();
        let ready = vec![
            Issue::builder().id("low").dk_priority(Priority::P2).dk_risk(Risk::Low).build(),
            Issue::builder().id("crit").dk_priority(Priority::P2).dk_risk(Risk::Critical).build(),
            Issue::builder().id("first").dk_priority(Priority::P0).dk_risk(Risk::Low).build(),
        ];

        let (lanes, _, _) = scheduler(&config).pack_lanes(&ready, &[]);
        assert_eq!(ids(&lanes), ["first", "crit", "low"]);
    }

    #[test]
    fn speculate_reserves_extra_slots() {
        let mut config = config();
        config.max_concurrent_workcells = 3;
        let speculating = Issue::builder().id("1").dk_speculate(true).build();
        let ready = vec![speculating, issue("2"), issue("3")];

        let (lanes, skipped, _) = scheduler(&config).pack_lanes(&ready, &[]);
        // Parallelism 2 reserves one extra slot: 3 slots fit "1" (x2) + "2".
        assert_eq!(ids(&lanes), ["1", "2"]);
        assert_eq!(ids(&skipped), ["3"]);
    }

    #[test]
    fn plan_never_exceeds_limits() {
        let config = config();
        let ready: Vec<Issue> = (0..20).map(|i| issue(&i.to_string())).collect();
        let graph = WorkGraph::new(ready, vec![]);

        let plan = scheduler(&config).schedule(&graph);
        assert!(plan.scheduled.len() <= config.max_concurrent_workcells);
        assert!(plan.total_estimated_tokens() <= config.max_concurrent_tokens);
    }
}

mod speculate_decision {
    use super::*;

    #[test]
    fn explicit_flag_triggers() {
        let config = config();
        let flagged = Issue::builder().id("1").dk_speculate(true).build();
        assert!(scheduler(&config).should_speculate(&flagged, &[]));
    }

    #[test]
    fn force_override_triggers() {
        let mut config = config();
        config.force_speculate = true;
        assert!(scheduler(&config).should_speculate(&issue("1"), &[]));
    }

    #[test]
    fn high_risk_on_critical_path_triggers() {
        let config = config();
        let risky = Issue::builder().id("1").dk_risk(Risk::High).build();
        assert!(scheduler(&config).should_speculate(&risky, &[risky.clone()]));
    }

    #[test]
    fn high_risk_off_critical_path_does_not_trigger() {
        let config = config();
        let risky = Issue::builder().id("1").dk_risk(Risk::High).build();
        assert!(!scheduler(&config).should_speculate(&risky, &[]));
    }

    #[test]
    fn low_risk_on_critical_path_does_not_trigger() {
        let config = config();
        let mild = Issue::builder().id("1").dk_risk(Risk::Low).build();
        assert!(!scheduler(&config).should_speculate(&mild, &[mild.clone()]));
    }

    #[test]
    fn disabled_speculation_wins_over_everything() {
        let mut config = config();
        config.speculation.enabled = false;
        let flagged = Issue::builder().id("1").dk_speculate(true).build();
        assert!(!scheduler(&config).should_speculate(&flagged, &[]));
    }
}

mod laws {
    use super::*;

    // Schedule idempotence: same snapshot, same running set ⇒ same plan.
    #[test]
    fn schedule_is_idempotent() {
        let config = config();
        let clock = FakeClock::new();
        let graph = WorkGraph::new(
            vec![issue("1"), issue("2"), issue("3"), issue("4")],
            vec![blocks("1", "2")],
        );

        let a = Scheduler::new(&config, clock.clone()).schedule(&graph);
        let b = Scheduler::new(&config, clock).schedule(&graph);

        assert_eq!(ids(&a.scheduled), ids(&b.scheduled));
        assert_eq!(ids(&a.ready), ids(&b.ready));
        assert_eq!(a.speculate, b.speculate);
    }

    // Ready monotonicity: nothing changed ⇒ still ready next cycle.
    #[test]
    fn ready_issues_stay_ready() {
        let config = config();
        let graph = WorkGraph::new(vec![issue("1"), issue("2")], vec![]);
        let sched = scheduler(&config);

        let first: std::collections::HashSet<String> =
            sched.compute_ready_set(&graph).into_iter().map(|i| i.id).collect();
        let second: std::collections::HashSet<String> =
            sched.compute_ready_set(&graph).into_iter().map(|i| i.id).collect();
        assert!(first.is_subset(&second));
    }
}
