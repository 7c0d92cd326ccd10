// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use anyhow::Context as _;
use chrono::Utc;
use foreman_core::{Event, EventType, IssueStatus};
use std::path::Path;

pub fn run(repo_root: &Path, issue_id: &str, reason: &str) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;

    // Human override: escalation is allowed from any state.
    context
        .state
        .force_issue_status(issue_id, IssueStatus::Escalated)
        .with_context(|| format!("escalating issue {issue_id}"))?;

    context.state.add_event(
        Event::new(EventType::IssueEscalated, Utc::now())
            .issue_id(issue_id)
            .datum("reason", reason)
            .datum("manual", true),
    );

    println!("Issue {issue_id} escalated: {reason}");
    Ok(())
}
