// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use clap::Args;
use foreman_engine::WorkcellManager;
use std::path::Path;

#[derive(Args)]
pub struct CleanupArgs {
    /// Remove all workcells
    #[arg(long)]
    pub all: bool,
    /// Remove workcells older than N days
    #[arg(long)]
    pub older_than: Option<i64>,
    /// Archive logs before removal
    #[arg(long)]
    pub keep_logs: bool,
}

pub fn run(repo_root: &Path, args: CleanupArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.all || args.older_than.is_some(),
        "pass --all or --older-than <days>"
    );

    let context = CommandContext::load(repo_root)?;
    let manager = WorkcellManager::new(&context.config);
    let cutoff = args
        .older_than
        .map(|days| chrono::Utc::now() - chrono::Duration::days(days));

    let runtime = tokio::runtime::Runtime::new()?;
    let count = runtime.block_on(async {
        let mut count = 0usize;
        for path in manager.list_active() {
            if let Some(cutoff) = cutoff {
                let created = manager
                    .marker(&path)
                    .and_then(|m| foreman_core::time::parse_utc(&marker_timestamp(&m.created)));
                // Unparseable markers are only removed by --all.
                match created {
                    Some(created) if created < cutoff => {}
                    _ if args.all => {}
                    _ => continue,
                }
            }
            manager.cleanup(&path, args.keep_logs).await;
            count += 1;
        }
        count
    });

    println!("Cleaned up {count} workcells");
    Ok(())
}

/// Expand a compact marker timestamp (`20260801T120000Z`) into a
/// parseable ISO form.
fn marker_timestamp(compact: &str) -> String {
    let digits: String = compact.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 14 {
        return compact.to_string();
    }
    format!(
        "{}-{}-{}T{}:{}:{}Z",
        &digits[0..4],
        &digits[4..6],
        &digits[6..8],
        &digits[8..10],
        &digits[10..12],
        &digits[12..14]
    )
}
