// SPDX-License-Identifier: MIT

use anyhow::Context as _;
use std::path::Path;

pub fn run(repo_root: &Path) -> anyhow::Result<()> {
    let config_path =
        foreman_config::initialize(repo_root).context("initializing repository")?;
    println!("Initialized foreman");
    println!("Config: {}", config_path.display());
    println!("Run: foreman run --once");
    Ok(())
}
