// SPDX-License-Identifier: MIT

//! Shared fixtures for integration specs.

use foreman_config::Config;
use foreman_core::FakeClock;
use foreman_storage::{EventLog, StateManager};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

/// Initialize a real git repository with an initial commit on `main` and
/// a foreman config whose gates are cheap shell commands.
pub fn init_repo(dir: &Path) -> Arc<Config> {
    let git = |args: &[&str]| {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    };
    git(&["init", "-b", "main"]);
    git(&["config", "user.email", "test@test.com"]);
    git(&["config", "user.name", "Test User"]);
    std::fs::write(dir.join("README.md"), "# Test Repo\n").unwrap();
    git(&["add", "."]);
    git(&["commit", "-m", "Initial commit"]);

    foreman_config::initialize(dir).unwrap();
    std::fs::write(
        dir.join(".foreman/config.toml"),
        r#"
max_concurrent_workcells = 3
toolchain_priority = ["fake"]

[toolchains.fake]
enabled = true

[gates]
test_command = "echo tests pass"
typecheck_command = "echo types ok"
lint_command = "echo lint ok"
timeout_seconds = 30
"#,
    )
    .unwrap();

    Arc::new(Config::load(dir).unwrap())
}

pub fn state_manager(config: &Config, clock: FakeClock) -> Arc<StateManager<FakeClock>> {
    let events = EventLog::new(config.events_file());
    Arc::new(StateManager::new(config.graph_dir(), events, clock))
}
