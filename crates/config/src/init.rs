// SPDX-License-Identifier: MIT

//! Repository initialization: directory tree, default config, gitignore.

use crate::{Config, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_TOML: &str = r#"# Foreman orchestrator configuration

max_concurrent_workcells = 3
max_concurrent_tokens = 200000
starvation_threshold_hours = 4.0
poll_interval_seconds = 10

toolchain_priority = ["codex", "claude", "crush"]

[toolchains.codex]
enabled = true
path = "codex"
model = "gpt-5.2"
timeout_seconds = 1800
max_tokens = 100000

[toolchains.claude]
enabled = true
path = "claude"
model = "opus"
timeout_seconds = 2700
max_tokens = 100000

[toolchains.crush]
enabled = false
path = "crush"
timeout_seconds = 1800
max_tokens = 100000

[gates]
test_command = "cargo test"
typecheck_command = "cargo check"
lint_command = "cargo clippy -- -D warnings"
timeout_seconds = 300
retry_flaky = 2

[speculation]
enabled = true
default_parallelism = 2
max_parallelism = 3
vote_threshold = 0.7
auto_trigger_on_critical_path = true
auto_trigger_risk_levels = ["high", "critical"]

[[routing.rules]]
match = { dk_tool_hint = "codex" }
use = ["codex"]

[[routing.rules]]
match = { dk_tool_hint = "claude" }
use = ["claude"]

[[routing.rules]]
match = { dk_risk = ["high", "critical"] }
speculate = true
parallelism = 2
use = ["codex", "claude"]

[[routing.rules]]
match = {}
use = ["claude"]

[routing.fallbacks]
codex = ["claude"]
claude = ["codex"]
crush = ["claude"]
"#;

/// Gitignore entries for the directories the orchestrator owns.
const GITIGNORE_ENTRIES: [&str; 4] =
    [".workcells/", ".foreman/logs/", ".foreman/archives/", ".foreman/state/"];

/// Initialize the orchestrator in a repository.
///
/// Creates the `.foreman` tree and `.workcells`, writes a default config
/// when none exists, and appends the foreman directories to the repo
/// `.gitignore`. Idempotent. Returns the config path.
pub fn initialize(repo_root: &Path) -> Result<PathBuf, ConfigError> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ConfigError::Io { path, source }
    };

    let foreman_dir = repo_root.join(".foreman");
    for dir in ["graph", "logs", "state", "archives"] {
        let path = foreman_dir.join(dir);
        fs::create_dir_all(&path).map_err(io(&path))?;
    }

    let workcells_dir = repo_root.join(".workcells");
    fs::create_dir_all(&workcells_dir).map_err(io(&workcells_dir))?;

    let config_path = repo_root.join(Config::CONFIG_REL_PATH);
    if !config_path.exists() {
        fs::write(&config_path, DEFAULT_CONFIG_TOML).map_err(io(&config_path))?;
        tracing::info!(path = %config_path.display(), "wrote default config");
    }

    // Workcells are never tracked
    let wc_gitignore = workcells_dir.join(".gitignore");
    if !wc_gitignore.exists() {
        fs::write(&wc_gitignore, "# Ignore all workcells\n*\n!.gitignore\n")
            .map_err(io(&wc_gitignore))?;
    }

    let repo_gitignore = repo_root.join(".gitignore");
    if repo_gitignore.exists() {
        let contents = fs::read_to_string(&repo_gitignore).map_err(io(&repo_gitignore))?;
        let additions: Vec<&str> =
            GITIGNORE_ENTRIES.iter().copied().filter(|entry| !contents.contains(entry)).collect();
        if !additions.is_empty() {
            let mut updated = contents;
            if !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str("\n# Foreman\n");
            for entry in additions {
                updated.push_str(entry);
                updated.push('\n');
            }
            fs::write(&repo_gitignore, updated).map_err(io(&repo_gitignore))?;
        }
    }

    Ok(config_path)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
