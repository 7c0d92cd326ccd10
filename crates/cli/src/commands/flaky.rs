// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use clap::Subcommand;
use foreman_core::time;
use std::path::Path;

#[derive(Subcommand)]
pub enum FlakyCommand {
    /// List known flaky gates
    List,
    /// Ignore a flaky gate (its failures stop blocking)
    Ignore { name: String },
    /// Clear all flaky data
    Clear,
}

pub fn run(repo_root: &Path, command: FlakyCommand) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;

    match command {
        FlakyCommand::List => {
            let data = context.flaky.load();
            if data.tests.is_empty() {
                println!("No flaky gates recorded");
                return Ok(());
            }
            for (name, entry) in &data.tests {
                let status = if entry.ignored { "ignored" } else { "tracked" };
                let last_seen = entry
                    .last_seen
                    .map(time::format_utc)
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "{name}  failures={}  last_seen={last_seen}  {status}",
                    entry.failure_count
                );
            }
        }
        FlakyCommand::Ignore { name } => {
            context.flaky.ignore(&name);
            println!("Ignoring flaky gate: {name}");
        }
        FlakyCommand::Clear => {
            context.flaky.clear();
            println!("Flaky data cleared");
        }
    }
    Ok(())
}
