//! Command implementations.

pub mod check;
pub mod shell;
pub mod up;

use std::path::Path;

use anyhow::Context;
use tunsession::TunConfig;

/// Load a configuration file, naming it in the error.
pub fn load_config(path: &Path) -> anyhow::Result<TunConfig> {
    TunConfig::load(path).with_context(|| format!("loading {}", path.display()))
}
