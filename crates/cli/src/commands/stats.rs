// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use std::path::Path;

pub fn run(repo_root: &Path) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;
    let stats = context.events().stats();

    println!("Total events:     {}", stats.total_events);
    println!("Issues completed: {}", stats.issues_completed);
    println!("Issues failed:    {}", stats.issues_failed);
    println!("Success rate:     {:.1}%", stats.success_rate * 100.0);
    println!("Total tokens:     {}", stats.total_tokens);
    println!("Total cost:       ${:.4}", stats.total_cost_usd);
    println!("Avg duration:     {}ms", stats.avg_duration_ms);
    Ok(())
}
