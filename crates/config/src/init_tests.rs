// SPDX-License-Identifier: MIT

use super::*;
use crate::Config;

#[test]
fn creates_directory_tree_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = initialize(dir.path()).unwrap();

    assert!(config_path.exists());
    for sub in ["graph", "logs", "state", "archives"] {
        assert!(dir.path().join(".foreman").join(sub).is_dir(), "missing .foreman/{sub}");
    }
    assert!(dir.path().join(".workcells/.gitignore").exists());

    // The default config must load and validate.
    let config = Config::load(dir.path()).unwrap();
    assert!(config.toolchains.contains_key("codex"));
    assert!(!config.routing.rules.is_empty());
}

#[test]
fn is_idempotent_and_preserves_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    initialize(dir.path()).unwrap();

    let config_path = dir.path().join(Config::CONFIG_REL_PATH);
    std::fs::write(&config_path, "max_concurrent_workcells = 7\n").unwrap();

    initialize(dir.path()).unwrap();
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.max_concurrent_workcells, 7);
}

#[test]
fn appends_to_existing_gitignore_once() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();

    initialize(dir.path()).unwrap();
    initialize(dir.path()).unwrap();

    let contents = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(contents.contains("target/"));
    assert_eq!(contents.matches(".workcells/").count(), 1);
    assert_eq!(contents.matches(".foreman/archives/").count(), 1);
}

#[test]
fn leaves_missing_gitignore_alone() {
    let dir = tempfile::tempdir().unwrap();
    initialize(dir.path()).unwrap();
    assert!(!dir.path().join(".gitignore").exists());
}
