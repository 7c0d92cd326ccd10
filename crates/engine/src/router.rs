// SPDX-License-Identifier: MIT

//! Router: rule-based toolchain selection with scored fallback.
//!
//! Three selection modes:
//! - scored single pick ([`Router::route`]) for reporting and hint
//!   handling,
//! - ordered candidate chain ([`Router::ordered_candidates`]) for
//!   fallback retry,
//! - speculate candidate set ([`Router::speculate_candidates`]).

use foreman_config::Config;
use foreman_core::{Issue, Risk, Size};
use std::collections::HashMap;

/// Result of a routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub toolchain: String,
    pub reason: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostTier {
    Low,
    Medium,
    High,
}

impl CostTier {
    /// Bonus applied when cost optimization kicks in (low risk, small size).
    fn bonus(self) -> f64 {
        match self {
            CostTier::Low => 10.0,
            CostTier::Medium => 5.0,
            CostTier::High => 0.0,
        }
    }
}

/// Profile of a toolchain's capabilities.
#[derive(Debug, Clone)]
pub struct ToolchainProfile {
    pub name: String,
    pub max_complexity: Size,
    pub best_for: Vec<String>,
    pub cost_tier: CostTier,
    pub reliability: f64,
}

fn profile(
    name: &str,
    max_complexity: Size,
    best_for: &[&str],
    cost_tier: CostTier,
    reliability: f64,
) -> (String, ToolchainProfile) {
    (
        name.to_string(),
        ToolchainProfile {
            name: name.to_string(),
            max_complexity,
            best_for: best_for.iter().map(|s| s.to_string()).collect(),
            cost_tier,
            reliability,
        },
    )
}

/// Default profiles for the known toolchains.
pub fn default_profiles() -> HashMap<String, ToolchainProfile> {
    HashMap::from([
        profile("codex", Size::XL, &["refactor", "api", "test", "fix"], CostTier::High, 0.85),
        profile("claude", Size::XL, &["auth", "security", "complex", "architecture"], CostTier::High, 0.90),
        profile("crush", Size::XL, &["general", "flexible", "multi-provider"], CostTier::Medium, 0.85),
    ])
}

/// Picks adapter candidates for an issue.
pub struct Router<'a> {
    config: &'a Config,
    profiles: HashMap<String, ToolchainProfile>,
}

impl<'a> Router<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, profiles: default_profiles() }
    }

    pub fn with_profiles(mut self, profiles: HashMap<String, ToolchainProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Scored single-dispatch selection among `available` adapters.
    pub fn route(&self, issue: &Issue, available: &[String]) -> RoutingDecision {
        // Explicit hint short-circuits scoring.
        if let Some(hint) = &issue.dk_tool_hint {
            if available.iter().any(|a| a == hint) {
                return RoutingDecision {
                    toolchain: hint.clone(),
                    reason: "explicit_hint".to_string(),
                    alternatives: available.iter().filter(|a| *a != hint).cloned().collect(),
                };
            }
        }

        if available.is_empty() {
            let first = self
                .config
                .toolchain_priority
                .first()
                .cloned()
                .unwrap_or_else(|| "codex".to_string());
            return RoutingDecision {
                toolchain: first,
                reason: "no_available_fallback".to_string(),
                alternatives: Vec::new(),
            };
        }

        // Score candidates in priority order so equal scores resolve to
        // the leftmost entry of the priority list.
        let mut ordered: Vec<&String> = available.iter().collect();
        ordered.sort_by_key(|name| self.priority_index(name));

        let mut best: Option<(&String, f64, String)> = None;
        let mut scores = HashMap::new();
        for name in &ordered {
            let (score, reason) = self.score_toolchain(name, issue);
            scores.insert((*name).clone(), score);
            if best.as_ref().map_or(true, |(_, best_score, _)| score > *best_score) {
                best = Some((name, score, reason));
            }
        }

        // `ordered` is non-empty here, so `best` is always set.
        let Some((winner, _, reason)) = best else {
            return RoutingDecision {
                toolchain: "codex".to_string(),
                reason: "no_available_fallback".to_string(),
                alternatives: Vec::new(),
            };
        };

        tracing::debug!(issue_id = %issue.id, selected = %winner, reason = %reason, ?scores, "toolchain routed");
        RoutingDecision {
            toolchain: (*winner).clone(),
            reason,
            alternatives: available.iter().filter(|a| *a != winner).cloned().collect(),
        }
    }

    fn priority_index(&self, name: &str) -> usize {
        self.config
            .toolchain_priority
            .iter()
            .position(|p| p == name)
            .unwrap_or(self.config.toolchain_priority.len())
    }

    /// Score one toolchain for one issue. Returns (score, reason).
    fn score_toolchain(&self, name: &str, issue: &Issue) -> (f64, String) {
        let Some(profile) = self.profiles.get(name) else {
            return (50.0, "no_profile".to_string());
        };

        let mut score = 50.0;
        let mut reason = "default".to_string();

        // Tag matching, 10 points per hit
        let matching: Vec<&String> =
            issue.tags.iter().filter(|t| profile.best_for.contains(t)).collect();
        if !matching.is_empty() {
            score += matching.len() as f64 * 10.0;
            let tags: Vec<&str> = matching.iter().map(|t| t.as_str()).collect();
            reason = format!("tag_match:{}", tags.join(","));
        }

        // Complexity fit
        if issue.dk_size <= profile.max_complexity {
            score += 15.0;
        } else {
            score -= 20.0;
        }

        // High-risk work goes to reliable toolchains
        if matches!(issue.dk_risk, Risk::High | Risk::Critical) {
            score += profile.reliability * 15.0;
            if profile.reliability >= 0.9 {
                reason = "high_reliability_for_risk".to_string();
            }
        }

        // Cheap toolchains win simple low-risk work
        if issue.dk_risk == Risk::Low && matches!(issue.dk_size, Size::XS | Size::S) {
            let bonus = profile.cost_tier.bonus();
            score += bonus;
            if bonus == 10.0 {
                reason = "cost_optimized".to_string();
            }
        }

        // Slight preference for the configured priority order
        let priority_len = self.config.toolchain_priority.len();
        let index = self.priority_index(name);
        if index < priority_len {
            score += (priority_len - index) as f64 * 2.0;
        }

        (score, reason)
    }

    /// Ordered candidate chain for single-dispatch fallback retry: the
    /// first matching rule's adapters, then their configured fallbacks,
    /// then the priority order; deduplicated preserving first occurrence.
    pub fn ordered_candidates(&self, issue: &Issue) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(rule) = self.config.routing.first_matching_rule(issue, None) {
            for toolchain in &rule.r#use {
                candidates.push(toolchain.clone());
            }
            for toolchain in &rule.r#use {
                candidates.extend(self.config.routing.fallbacks_for(toolchain).iter().cloned());
            }
        }

        candidates.extend(self.config.toolchain_priority.iter().cloned());
        dedupe_preserve_order(candidates)
    }

    /// Candidate set for speculate fan-out: the tool hint (if any)
    /// prepended to the first speculate rule's adapter list.
    pub fn speculate_candidates(&self, issue: &Issue) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(hint) = &issue.dk_tool_hint {
            candidates.push(hint.clone());
        }
        if let Some(rule) = self.config.routing.first_matching_rule(issue, Some(true)) {
            candidates.extend(rule.r#use.iter().cloned());
        }

        dedupe_preserve_order(candidates)
    }

    /// Desired speculate parallelism: rule override, else config default,
    /// capped at the configured maximum.
    pub fn speculate_parallelism(&self, issue: &Issue) -> usize {
        let requested = self
            .config
            .routing
            .first_matching_rule(issue, Some(true))
            .and_then(|rule| rule.parallelism)
            .filter(|p| *p > 0)
            .unwrap_or(self.config.speculation.default_parallelism);
        requested.min(self.config.speculation.max_parallelism)
    }
}

fn dedupe_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| !item.is_empty() && seen.insert(item.clone())).collect()
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
