// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman: Autonomous development-task orchestrator.

mod commands;
mod context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "foreman", version, about = "Autonomous development-task orchestrator")]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize foreman in a repository
    Init,
    /// Run the orchestrator loop
    Run(commands::run::RunArgs),
    /// Show orchestrator status
    Status {
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// List active workcells
    Workcells {
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Show event history
    History {
        /// Only events for this issue
        #[arg(long)]
        issue: Option<String>,
        /// Last N events
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Show aggregate statistics
    Stats,
    /// Manage flaky gates
    #[command(subcommand)]
    FlakyTests(commands::flaky::FlakyCommand),
    /// Manually escalate an issue
    Escalate {
        issue_id: String,
        /// Reason for escalation
        #[arg(long)]
        reason: String,
    },
    /// Clean up workcells
    Cleanup(commands::cleanup::CleanupArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("foreman=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let repo_root = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Init => commands::init::run(&repo_root),
        Command::Run(args) => commands::run::run(&repo_root, args),
        Command::Status { json } => commands::status::run(&repo_root, json),
        Command::Workcells { json } => commands::workcells::run(&repo_root, json),
        Command::History { issue, limit, json } => {
            commands::history::run(&repo_root, issue.as_deref(), limit, json)
        }
        Command::Stats => commands::stats::run(&repo_root),
        Command::FlakyTests(command) => commands::flaky::run(&repo_root, command),
        Command::Escalate { issue_id, reason } => {
            commands::escalate::run(&repo_root, &issue_id, &reason)
        }
        Command::Cleanup(args) => commands::cleanup::run(&repo_root, args),
    }
}
