// SPDX-License-Identifier: MIT

//! Routing rules: ordered match-predicates mapping issues to toolchains.

use crate::ConfigError;
use foreman_core::Issue;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A match value that is either a literal or a member-of set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    One(String),
    Many(Vec<String>),
}

impl MatchValue {
    pub fn matches(&self, actual: Option<&str>) -> bool {
        match self {
            MatchValue::One(expected) => actual == Some(expected.as_str()),
            MatchValue::Many(set) => {
                actual.map_or(false, |a| set.iter().any(|candidate| candidate == a))
            }
        }
    }
}

/// Predicate block of a routing rule. All present fields are ANDed; an
/// empty predicate matches every issue (the final catch-all).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleMatch {
    pub dk_tool_hint: Option<MatchValue>,
    pub dk_risk: Option<MatchValue>,
    pub dk_size: Option<MatchValue>,
    pub tags_any: Option<Vec<String>>,
    pub tags_all: Option<Vec<String>>,
    pub title_pattern: Option<String>,
    pub description_pattern: Option<String>,
}

impl RuleMatch {
    pub fn is_empty(&self) -> bool {
        self.dk_tool_hint.is_none()
            && self.dk_risk.is_none()
            && self.dk_size.is_none()
            && self.tags_any.is_none()
            && self.tags_all.is_none()
            && self.title_pattern.is_none()
            && self.description_pattern.is_none()
    }

    /// Reject unparseable regex patterns at load time.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (field, pattern) in
            [("title_pattern", &self.title_pattern), ("description_pattern", &self.description_pattern)]
        {
            if let Some(pattern) = pattern {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::Invalid(format!("routing rule {field} {pattern:?}: {e}"))
                })?;
            }
        }
        Ok(())
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(hint) = &self.dk_tool_hint {
            if !hint.matches(issue.dk_tool_hint.as_deref()) {
                return false;
            }
        }
        if let Some(risk) = &self.dk_risk {
            if !risk.matches(Some(&issue.dk_risk.to_string())) {
                return false;
            }
        }
        if let Some(size) = &self.dk_size {
            if !size.matches(Some(&issue.dk_size.to_string())) {
                return false;
            }
        }
        if let Some(any) = &self.tags_any {
            if !any.iter().any(|t| issue.tags.contains(t)) {
                return false;
            }
        }
        if let Some(all) = &self.tags_all {
            if !all.iter().all(|t| issue.tags.contains(t)) {
                return false;
            }
        }
        if let Some(pattern) = &self.title_pattern {
            if !regex_matches(pattern, &issue.title) {
                return false;
            }
        }
        if let Some(pattern) = &self.description_pattern {
            if !regex_matches(pattern, issue.description.as_deref().unwrap_or("")) {
                return false;
            }
        }
        true
    }
}

/// Patterns are validated at load; an invalid one reaching this point
/// (hand-built config) just fails to match.
fn regex_matches(pattern: &str, text: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid routing pattern, treating as non-match");
            false
        }
    }
}

/// A single routing rule, evaluated in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingRule {
    pub r#match: RuleMatch,
    pub r#use: Vec<String>,
    pub speculate: bool,
    pub parallelism: Option<usize>,
}

/// Toolchain routing configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub rules: Vec<RoutingRule>,
    pub fallbacks: IndexMap<String, Vec<String>>,
}

impl RoutingConfig {
    /// First rule whose predicate matches, optionally filtered to
    /// speculate rules only.
    pub fn first_matching_rule(
        &self,
        issue: &Issue,
        require_speculate: Option<bool>,
    ) -> Option<&RoutingRule> {
        self.rules
            .iter()
            .filter(|rule| require_speculate.map_or(true, |want| rule.speculate == want))
            .find(|rule| rule.r#match.matches(issue))
    }

    pub fn fallbacks_for(&self, toolchain: &str) -> &[String] {
        self.fallbacks.get(toolchain).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
