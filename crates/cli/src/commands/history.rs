// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use foreman_core::time;
use std::path::Path;

pub fn run(
    repo_root: &Path,
    issue: Option<&str>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;

    let mut events = match issue {
        Some(issue_id) => context.events().by_issue(issue_id),
        None => context.events().read_all(),
    };
    if events.len() > limit {
        events.drain(..events.len() - limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No events recorded");
        return Ok(());
    }
    for event in events {
        let mut line = format!("{}  {}", time::format_utc(event.timestamp), event.event_type);
        if let Some(issue_id) = &event.issue_id {
            line.push_str(&format!("  issue={issue_id}"));
        }
        if let Some(workcell_id) = &event.workcell_id {
            line.push_str(&format!("  workcell={workcell_id}"));
        }
        if let Some(duration) = event.duration_ms {
            line.push_str(&format!("  {duration}ms"));
        }
        println!("{line}");
    }
    Ok(())
}
