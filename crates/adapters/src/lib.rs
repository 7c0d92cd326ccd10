// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman-adapters: Uniform contract for external agent toolchains.
//!
//! The orchestrator never inspects adapter internals: an adapter executes
//! a manifest inside a workcell and hands back a Patch+Proof, whatever
//! happened. Concrete toolchains are registered by name at process start.

mod cli_adapter;
mod registry;
pub mod subprocess;
mod toolchain;

pub mod notify;

pub use cli_adapter::CliAdapter;
pub use notify::{DesktopNotifyAdapter, NotifyAdapter, NotifyError};
pub use registry::AdapterRegistry;
pub use toolchain::{CostEstimate, ToolchainAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAdapter, FakeCall};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{EscalationAlert, FakeNotifyAdapter};
