// SPDX-License-Identifier: MIT

//! Shared command context: config + stores for a repository.

use anyhow::Context as _;
use foreman_config::Config;
use foreman_core::SystemClock;
use foreman_storage::{EventLog, FlakyStore, StateManager};
use std::path::Path;
use std::sync::Arc;

pub struct CommandContext {
    pub config: Arc<Config>,
    pub state: Arc<StateManager<SystemClock>>,
    pub flaky: Arc<FlakyStore>,
}

impl CommandContext {
    pub fn load(repo_root: &Path) -> anyhow::Result<Self> {
        let config =
            Arc::new(Config::load(repo_root).context("loading configuration")?);
        let events = EventLog::new(config.events_file());
        let state = Arc::new(StateManager::new(config.graph_dir(), events, SystemClock));
        let flaky = Arc::new(FlakyStore::new(config.flaky_file()));
        Ok(Self { config, state, flaky })
    }

    pub fn events(&self) -> &EventLog {
        self.state.events()
    }
}
