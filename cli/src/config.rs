//! State-file management
//!
//! The CLI drives an in-memory world that persists as JSON between
//! invocations; each command loads it, runs one step and writes it back.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use migration_core::sim::SimHarness;

pub struct CliConfig {
    pub state_path: PathBuf,
    pub verbose: bool,
}

impl CliConfig {
    pub fn new(state_path: PathBuf, verbose: bool) -> Self {
        CliConfig {
            state_path,
            verbose,
        }
    }
}

/// Load the persisted harness
pub fn load_harness(path: &Path) -> Result<SimHarness> {
    if !path.exists() {
        anyhow::bail!(
            "No state file at {}\nCreate one with: migrator setup --scenario <file>",
            path.display()
        );
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse state file: {}", path.display()))
}

/// Persist the harness back to disk
pub fn save_harness(path: &Path, harness: &SimHarness) -> Result<()> {
    let data = serde_json::to_string_pretty(harness).context("Failed to serialize state")?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write state file: {}", path.display()))
}
