// SPDX-License-Identifier: MIT

use super::*;
use foreman_core::Priority;

fn config_with_rules() -> Config {
    let toml = r#"
toolchain_priority = ["codex", "claude", "crush"]

[[routing.rules]]
match = { dk_tool_hint = "codex" }
use = ["codex"]

[[routing.rules]]
match = { dk_risk = ["high", "critical"] }
speculate = true
parallelism = 2
use = ["codex", "claude"]

[[routing.rules]]
match = {}
use = ["claude"]

[routing.fallbacks]
codex = ["claude", "crush"]
claude = ["codex"]
"#;
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".foreman")).unwrap();
    std::fs::write(dir.path().join(".foreman/config.toml"), toml).unwrap();
    Config::load(dir.path()).unwrap()
}

fn all_available() -> Vec<String> {
    vec!["codex".to_string(), "claude".to_string(), "crush".to_string()]
}

mod scored_route {
    use super::*;

    #[test]
    fn explicit_hint_wins_when_available() {
        let config = config_with_rules();
        let issue = Issue::builder().dk_tool_hint("claude").build();

        let decision = Router::new(&config).route(&issue, &all_available());
        assert_eq!(decision.toolchain, "claude");
        assert_eq!(decision.reason, "explicit_hint");
        assert_eq!(decision.alternatives, vec!["codex", "crush"]);
    }

    #[test]
    fn unavailable_hint_falls_through_to_scoring() {
        let config = config_with_rules();
        let issue = Issue::builder().dk_tool_hint("claude").build();

        let decision = Router::new(&config).route(&issue, &["codex".to_string()]);
        assert_eq!(decision.toolchain, "codex");
        assert_ne!(decision.reason, "explicit_hint");
    }

    #[test]
    fn nothing_available_returns_first_priority() {
        let config = config_with_rules();
        let issue = Issue::builder().build();

        let decision = Router::new(&config).route(&issue, &[]);
        assert_eq!(decision.toolchain, "codex");
        assert_eq!(decision.reason, "no_available_fallback");
        assert!(decision.alternatives.is_empty());
    }

    #[test]
    fn matching_tags_boost_score() {
        let config = config_with_rules();
        let issue = Issue::builder()
            .tags(vec!["auth".to_string(), "security".to_string()])
            .build();

        // claude's best-for covers auth+security: +20 beats codex's
        // priority edge.
        let decision = Router::new(&config).route(&issue, &all_available());
        assert_eq!(decision.toolchain, "claude");
        assert!(decision.reason.starts_with("tag_match:"));
    }

    #[test]
    fn high_risk_prefers_reliability() {
        let config = config_with_rules();
        let issue = Issue::builder().dk_risk(foreman_core::Risk::High).build();

        // codex 50+15+12.75+6 = 83.75 edges out claude 50+15+13.5+4 = 82.5
        // on the priority bonus.
        let decision = Router::new(&config).route(&issue, &all_available());
        assert_eq!(decision.toolchain, "codex");

        // Drop codex from availability; claude wins with the reliability reason.
        let decision =
            Router::new(&config).route(&issue, &["claude".to_string(), "crush".to_string()]);
        assert_eq!(decision.toolchain, "claude");
        assert_eq!(decision.reason, "high_reliability_for_risk");
    }

    #[test]
    fn cheap_toolchain_wins_small_low_risk_work() {
        let config = config_with_rules();
        let issue = Issue::builder()
            .dk_risk(foreman_core::Risk::Low)
            .dk_size(foreman_core::Size::XS)
            .build();

        // crush is the only medium-cost profile: +5; codex/claude get 0.
        // codex: 50+15+0+6 = 71; claude: 50+15+0+4 = 69; crush: 50+15+5+2 = 72.
        let decision = Router::new(&config).route(&issue, &all_available());
        assert_eq!(decision.toolchain, "crush");
    }

    #[test]
    fn equal_scores_resolve_to_leftmost_priority() {
        let mut config = config_with_rules();
        config.toolchain_priority = vec!["claude".to_string(), "codex".to_string()];
        let issue = Issue::builder().dk_priority(Priority::P2).build();

        // Identical profiles-wise scores modulo priority bonus; leftmost
        // in the new priority order is claude.
        let router = Router::new(&config).with_profiles(HashMap::new());
        let decision =
            router.route(&issue, &["codex".to_string(), "claude".to_string()]);
        assert_eq!(decision.toolchain, "claude");
    }
}

mod candidate_chains {
    use super::*;

    #[test]
    fn rule_then_fallbacks_then_priority() {
        let config = config_with_rules();
        let issue = Issue::builder().dk_tool_hint("codex").build();

        let candidates = Router::new(&config).ordered_candidates(&issue);
        // codex (rule), claude+crush (codex fallbacks), priority adds nothing new.
        assert_eq!(candidates, ["codex", "claude", "crush"]);
    }

    #[test]
    fn catch_all_rule_applies_to_plain_issues() {
        let config = config_with_rules();
        let issue = Issue::builder().build();

        let candidates = Router::new(&config).ordered_candidates(&issue);
        // claude (catch-all), codex (claude fallback), then priority order.
        assert_eq!(candidates, ["claude", "codex", "crush"]);
    }

    #[test]
    fn no_rules_uses_priority_order() {
        let mut config = config_with_rules();
        config.routing.rules.clear();
        let issue = Issue::builder().build();

        let candidates = Router::new(&config).ordered_candidates(&issue);
        assert_eq!(candidates, ["codex", "claude", "crush"]);
    }
}

mod speculate {
    use super::*;

    fn risky() -> Issue {
        Issue::builder().dk_risk(foreman_core::Risk::High).build()
    }

    #[test]
    fn uses_first_speculate_rule() {
        let config = config_with_rules();
        let candidates = Router::new(&config).speculate_candidates(&risky());
        assert_eq!(candidates, ["codex", "claude"]);
    }

    #[test]
    fn hint_is_prepended_and_deduped() {
        let config = config_with_rules();
        let mut issue = risky();
        issue.dk_tool_hint = Some("claude".to_string());

        let candidates = Router::new(&config).speculate_candidates(&issue);
        assert_eq!(candidates, ["claude", "codex"]);
    }

    #[test]
    fn non_matching_issue_gets_no_candidates() {
        let config = config_with_rules();
        let issue = Issue::builder().build();
        assert!(Router::new(&config).speculate_candidates(&issue).is_empty());
    }

    #[test]
    fn parallelism_from_rule_else_default_capped_at_max() {
        let mut config = config_with_rules();
        assert_eq!(Router::new(&config).speculate_parallelism(&risky()), 2);

        // No speculate rule match → config default.
        let plain = Issue::builder().build();
        assert_eq!(Router::new(&config).speculate_parallelism(&plain), 2);

        // Rule value above the cap is clamped.
        config.routing.rules[1].parallelism = Some(9);
        assert_eq!(Router::new(&config).speculate_parallelism(&risky()), 3);
    }
}
