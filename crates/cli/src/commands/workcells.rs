// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use foreman_engine::WorkcellManager;
use std::path::Path;

pub fn run(repo_root: &Path, json: bool) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;
    let manager = WorkcellManager::new(&context.config);

    let entries: Vec<serde_json::Value> = manager
        .list_active()
        .iter()
        .filter_map(|path| {
            let marker = manager.marker(path)?;
            Some(serde_json::json!({
                "id": marker.id,
                "issue_id": marker.issue_id,
                "created": marker.created,
                "parent_commit": marker.parent_commit,
                "speculate_tag": marker.speculate_tag,
                "path": path.display().to_string(),
            }))
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No active workcells");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  issue={}  created={}",
            entry["id"].as_str().unwrap_or("?"),
            entry["issue_id"].as_str().unwrap_or("?"),
            entry["created"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}
