// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-config: Configuration loading for the Foreman orchestrator.
//!
//! Configuration lives at `<repo>/.foreman/config.toml`. A missing file
//! yields the built-in defaults; a malformed file or invalid values are
//! fatal (`ConfigError` propagates to the top-level runner).

mod init;
mod rules;

pub use init::initialize;
pub use rules::{MatchValue, RoutingConfig, RoutingRule, RuleMatch};

use foreman_core::Risk;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a specific toolchain adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub enabled: bool,
    /// CLI executable; empty means "use the toolchain name".
    pub path: String,
    pub model: Option<String>,
    pub timeout_seconds: u64,
    pub max_tokens: u64,
    pub env: IndexMap<String, String>,
    /// Adapter-specific passthrough, copied verbatim into the manifest.
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: String::new(),
            model: None,
            timeout_seconds: 1800,
            max_tokens: 100_000,
            env: IndexMap::new(),
            config: serde_json::Map::new(),
        }
    }
}

impl ToolchainConfig {
    /// Executable to invoke for this toolchain.
    pub fn executable<'a>(&'a self, name: &'a str) -> &'a str {
        if self.path.is_empty() {
            name
        } else {
            &self.path
        }
    }
}

/// Quality gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatesConfig {
    pub test_command: String,
    pub typecheck_command: String,
    pub lint_command: String,
    pub build_command: Option<String>,
    pub timeout_seconds: u64,
    /// Total executions allowed per gate (1 = no retry).
    pub retry_flaky: u32,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            test_command: "cargo test".to_string(),
            typecheck_command: "cargo check".to_string(),
            lint_command: "cargo clippy -- -D warnings".to_string(),
            build_command: None,
            timeout_seconds: 300,
            retry_flaky: 2,
        }
    }
}

impl GatesConfig {
    /// Ordered gate set, name → shell command.
    pub fn commands(&self) -> IndexMap<String, String> {
        let mut gates = IndexMap::new();
        gates.insert("test".to_string(), self.test_command.clone());
        gates.insert("typecheck".to_string(), self.typecheck_command.clone());
        gates.insert("lint".to_string(), self.lint_command.clone());
        if let Some(build) = &self.build_command {
            gates.insert("build".to_string(), build.clone());
        }
        gates
    }
}

/// Speculate+vote configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeculationConfig {
    pub enabled: bool,
    pub default_parallelism: usize,
    pub max_parallelism: usize,
    pub vote_threshold: f64,
    pub auto_trigger_on_critical_path: bool,
    pub auto_trigger_risk_levels: Vec<Risk>,
}

impl Default for SpeculationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_parallelism: 2,
            max_parallelism: 3,
            vote_threshold: 0.7,
            auto_trigger_on_critical_path: true,
            auto_trigger_risk_levels: vec![Risk::High, Risk::Critical],
        }
    }
}

fn default_toolchain_priority() -> Vec<String> {
    vec!["codex".to_string(), "claude".to_string(), "crush".to_string()]
}

/// Main orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Execution limits
    pub max_concurrent_workcells: usize,
    pub max_concurrent_tokens: u64,
    pub starvation_threshold_hours: f64,
    /// Sleep between cycles in continuous mode.
    pub poll_interval_seconds: u64,

    /// Toolchain priority order (also the final routing fallback).
    pub toolchain_priority: Vec<String>,
    pub toolchains: IndexMap<String, ToolchainConfig>,
    pub gates: GatesConfig,
    pub speculation: SpeculationConfig,
    pub routing: RoutingConfig,

    // Runtime overrides, set by the CLI and never persisted.
    #[serde(skip)]
    pub force_speculate: bool,
    #[serde(skip)]
    pub dry_run: bool,
    #[serde(skip)]
    pub repo_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_workcells: 3,
            max_concurrent_tokens: 200_000,
            starvation_threshold_hours: 4.0,
            poll_interval_seconds: 10,
            toolchain_priority: default_toolchain_priority(),
            toolchains: IndexMap::new(),
            gates: GatesConfig::default(),
            speculation: SpeculationConfig::default(),
            routing: RoutingConfig::default(),
            force_speculate: false,
            dry_run: false,
            repo_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Relative location of the config file inside a repository.
    pub const CONFIG_REL_PATH: &'static str = ".foreman/config.toml";

    /// Load configuration for a repository root.
    ///
    /// A missing config file yields defaults; parse and validation
    /// failures are fatal.
    pub fn load(repo_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let repo_root = repo_root.into();
        let path = repo_root.join(Self::CONFIG_REL_PATH);

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
            toml::from_str::<Config>(&contents)
                .map_err(|source| ConfigError::Parse { path: path.clone(), source: Box::new(source) })?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };

        config.repo_root = repo_root;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_workcells == 0 {
            return Err(ConfigError::Invalid("max_concurrent_workcells must be at least 1".into()));
        }
        if self.speculation.default_parallelism == 0 {
            return Err(ConfigError::Invalid(
                "speculation.default_parallelism must be at least 1".into(),
            ));
        }
        if self.speculation.default_parallelism > self.speculation.max_parallelism {
            return Err(ConfigError::Invalid(format!(
                "speculation.default_parallelism ({}) exceeds max_parallelism ({})",
                self.speculation.default_parallelism, self.speculation.max_parallelism
            )));
        }
        if !(0.0..=1.0).contains(&self.speculation.vote_threshold) {
            return Err(ConfigError::Invalid("speculation.vote_threshold must be in [0, 1]".into()));
        }
        for rule in &self.routing.rules {
            rule.r#match.validate()?;
        }
        Ok(())
    }

    /// Toolchains that are enabled in configuration.
    pub fn enabled_toolchains(&self) -> impl Iterator<Item = (&String, &ToolchainConfig)> {
        self.toolchains.iter().filter(|(_, tc)| tc.enabled)
    }

    pub fn toolchain(&self, name: &str) -> Option<&ToolchainConfig> {
        self.toolchains.get(name)
    }

    // Path layout, all relative to the repository root.

    pub fn foreman_dir(&self) -> PathBuf {
        self.repo_root.join(".foreman")
    }

    pub fn graph_dir(&self) -> PathBuf {
        self.foreman_dir().join("graph")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.foreman_dir().join("logs")
    }

    pub fn events_file(&self) -> PathBuf {
        self.logs_dir().join("events.jsonl")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.foreman_dir().join("state")
    }

    pub fn flaky_file(&self) -> PathBuf {
        self.state_dir().join("flaky.json")
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.foreman_dir().join("archives")
    }

    pub fn workcells_dir(&self) -> PathBuf {
        self.repo_root.join(".workcells")
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
