// SPDX-License-Identifier: MIT

use crate::context::CommandContext;
use clap::Args;
use foreman_adapters::{AdapterRegistry, DesktopNotifyAdapter};
use foreman_core::SystemClock;
use foreman_engine::{Dispatcher, KernelRunner, RunnerOptions, Verifier, WorkcellManager};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    /// Process one cycle and exit
    #[arg(long)]
    pub once: bool,
    /// Run a specific issue only
    #[arg(long)]
    pub issue: Option<String>,
    /// Override max concurrent workcells
    #[arg(long)]
    pub max_concurrent: Option<usize>,
    /// Force speculate mode for every dispatch
    #[arg(long)]
    pub speculate: bool,
    /// Show what would happen without executing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(repo_root: &Path, args: RunArgs) -> anyhow::Result<()> {
    let context = CommandContext::load(repo_root)?;

    let mut config = (*context.config).clone();
    if let Some(max) = args.max_concurrent {
        config.max_concurrent_workcells = max.max(1);
    }
    config.force_speculate = args.speculate;
    config.dry_run = args.dry_run;
    let config = Arc::new(config);

    let registry = Arc::new(AdapterRegistry::from_config(&config));
    anyhow::ensure!(
        !registry.is_empty(),
        "no toolchains configured; add [toolchains.<name>] entries to {}",
        foreman_config::Config::CONFIG_REL_PATH
    );

    let verifier =
        Verifier::new(config.clone(), context.flaky.clone(), context.events().clone());
    let dispatcher = Arc::new(Dispatcher::new(
        config.clone(),
        context.state.clone(),
        registry,
        Arc::new(WorkcellManager::new(&config)),
        verifier,
        DesktopNotifyAdapter::new(),
        SystemClock,
    ));

    let shutdown = CancellationToken::new();
    let options = RunnerOptions { once: args.once, target_issue: args.issue };
    let runner = KernelRunner::new(
        config,
        context.state.clone(),
        dispatcher,
        SystemClock,
        options,
        shutdown.clone(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                signal_token.cancel();
            }
        });
        runner.run().await
    });

    println!(
        "Cycles: {}, dispatched: {}, completed: {}, failed: {}",
        summary.cycles, summary.dispatched, summary.completed, summary.failed
    );
    Ok(())
}
