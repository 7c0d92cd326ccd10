// SPDX-License-Identifier: MIT

//! Adapter registry: name → adapter, with availability probing.

use crate::cli_adapter::CliAdapter;
use crate::subprocess::HEALTH_CHECK_TIMEOUT;
use crate::toolchain::ToolchainAdapter;
use foreman_config::Config;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds the concrete adapters registered at process start.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ToolchainAdapter>>,
    /// Registration order, used for deterministic iteration.
    order: Vec<String>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration: one [`CliAdapter`] per enabled
    /// toolchain, in priority order first, then remaining config order.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for name in &config.toolchain_priority {
            if let Some(tc) = config.toolchain(name) {
                if tc.enabled {
                    registry.register(Arc::new(CliAdapter::new(name.clone(), tc.clone())));
                }
            }
        }
        for (name, tc) in config.enabled_toolchains() {
            if !registry.contains(name) {
                registry.register(Arc::new(CliAdapter::new(name.clone(), tc.clone())));
            }
        }
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ToolchainAdapter>) {
        let name = adapter.name().to_string();
        if !self.adapters.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.adapters.insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolchainAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Probe every adapter's health, bounded per probe.
    ///
    /// Returns the names that responded healthy, in registration order.
    pub async fn available(&self) -> Vec<String> {
        let mut available = Vec::new();
        for name in &self.order {
            let Some(adapter) = self.adapters.get(name) else { continue };
            let healthy = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, adapter.health_check())
                .await
                .unwrap_or(false);
            if healthy {
                available.push(name.clone());
            } else {
                tracing::debug!(toolchain = %name, "adapter unavailable");
            }
        }
        available
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
