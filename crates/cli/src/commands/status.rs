// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use foreman_core::IssueStatus;
use foreman_engine::WorkcellManager;
use std::path::Path;

pub fn run(repo_root: &Path, json: bool) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;
    let graph = context.state.load_graph();

    let count = |status: IssueStatus| graph.issues.iter().filter(|i| i.status == status).count();
    let ready = context.state.get_ready_issues().len();
    let workcells = WorkcellManager::new(&context.config).list_active();

    if json {
        let payload = serde_json::json!({
            "issues": {
                "total": graph.issues.len(),
                "open": count(IssueStatus::Open),
                "ready": ready,
                "running": count(IssueStatus::Running),
                "done": count(IssueStatus::Done),
                "escalated": count(IssueStatus::Escalated),
                "blocked": count(IssueStatus::Blocked),
            },
            "deps": graph.deps.len(),
            "active_workcells": workcells.len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Issues: {} total", graph.issues.len());
    println!("  ready:     {ready}");
    println!("  running:   {}", count(IssueStatus::Running));
    println!("  done:      {}", count(IssueStatus::Done));
    println!("  escalated: {}", count(IssueStatus::Escalated));
    println!("  blocked:   {}", count(IssueStatus::Blocked));
    println!("Deps: {}", graph.deps.len());
    println!("Active workcells: {}", workcells.len());
    for path in workcells {
        println!("  {}", path.display());
    }
    Ok(())
}
