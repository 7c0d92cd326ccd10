// SPDX-License-Identifier: MIT

//! Alerts for issues that leave the automated pipeline.
//!
//! Escalated issues need a human; the alert channel is pluggable so the
//! orchestrator can run headless (tests use the in-memory fake).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("alert delivery failed: {0}")]
    SendFailed(String),
}

/// Outbound channel for escalation alerts.
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    /// Tell a human that an issue was escalated and why.
    async fn escalation(
        &self,
        issue_id: &str,
        reason: &str,
        detail: &str,
    ) -> Result<(), NotifyError>;
}

/// Desktop notifications via the freedesktop/Notification Center bridge.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifyAdapter;

impl DesktopNotifyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn escalation(
        &self,
        issue_id: &str,
        reason: &str,
        detail: &str,
    ) -> Result<(), NotifyError> {
        let summary = format!("Issue {issue_id} escalated");
        let body = format!("{reason}: {detail}");
        // Some platforms show notifications synchronously; run on the
        // blocking pool so a stuck desktop environment cannot stall the
        // dispatch worker.
        tokio::task::spawn_blocking(move || {
            match notify_rust::Notification::new().summary(&summary).body(&body).show() {
                Ok(_) => tracing::debug!(%summary, "escalation alert sent"),
                Err(e) => tracing::warn!(%summary, error = %e, "escalation alert failed"),
            }
        });
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{NotifyAdapter, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EscalationAlert {
        pub issue_id: String,
        pub reason: String,
        pub detail: String,
    }

    /// In-memory alert channel recording every escalation.
    #[derive(Clone, Default)]
    pub struct FakeNotifyAdapter {
        alerts: Arc<Mutex<Vec<EscalationAlert>>>,
    }

    impl FakeNotifyAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn alerts(&self) -> Vec<EscalationAlert> {
            self.alerts.lock().clone()
        }
    }

    #[async_trait]
    impl NotifyAdapter for FakeNotifyAdapter {
        async fn escalation(
            &self,
            issue_id: &str,
            reason: &str,
            detail: &str,
        ) -> Result<(), NotifyError> {
            self.alerts.lock().push(EscalationAlert {
                issue_id: issue_id.to_string(),
                reason: reason.to_string(),
                detail: detail.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{EscalationAlert, FakeNotifyAdapter};
