// SPDX-License-Identifier: MIT

//! Flaky-test side store.
//!
//! Gate runners do not parse individual test names out of gate output, so
//! entries are keyed by gate name. A gate matching an ignored entry does
//! not block aggregate-pass.

use chrono::{DateTime, Utc};
use foreman_core::time;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlakyEntry {
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default, with = "time::ts_opt", skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ignored: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlakyData {
    #[serde(default)]
    pub tests: IndexMap<String, FlakyEntry>,
}

/// JSON document store for flaky gates.
#[derive(Debug)]
pub struct FlakyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FlakyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Load the store; missing or corrupt files yield an empty document.
    pub fn load(&self) -> FlakyData {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return FlakyData::default();
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "corrupt flaky store, starting fresh");
            FlakyData::default()
        })
    }

    /// Record one flaky occurrence for a gate.
    pub fn record(&self, name: &str, now: DateTime<Utc>) {
        let _guard = self.write_lock.lock();
        let mut data = self.load();
        let entry = data.tests.entry(name.to_string()).or_default();
        entry.failure_count += 1;
        entry.last_seen = Some(now);
        self.save(&data);
    }

    /// Mark a gate as ignored (its failures no longer block success).
    pub fn ignore(&self, name: &str) {
        let _guard = self.write_lock.lock();
        let mut data = self.load();
        data.tests.entry(name.to_string()).or_default().ignored = true;
        self.save(&data);
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.load().tests.get(name).map_or(false, |entry| entry.ignored)
    }

    /// Drop all recorded entries.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.save(&FlakyData::default());
    }

    fn save(&self, data: &FlakyData) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(data)?;
            std::fs::write(&self.path, json)
        };
        if let Err(e) = write() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write flaky store");
        }
    }
}

#[cfg(test)]
#[path = "flaky_tests.rs"]
mod tests;
