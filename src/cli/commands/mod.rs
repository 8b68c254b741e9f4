//! Subcommand implementations.

pub mod clean;
pub mod filter;
pub mod range;
pub mod run;
pub mod version;

use crate::config::{CliOverrides, HarnessConfig};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Load configuration relative to the current directory.
///
/// # Errors
///
/// Returns an error if a config file is unreadable or a value is invalid.
pub fn load_config(explicit: Option<&Path>, overrides: &CliOverrides) -> Result<HarnessConfig> {
    let cwd = current_dir()?;
    HarnessConfig::load(&cwd, explicit, overrides)
}

pub(crate) fn current_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()?)
}
