//! Configuration loading utilities for CLI commands

use agriboundary_core::config::{CliConfigOverrides, LayeredConfig};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// File picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "agriboundary.toml";

/// Defaults, then the config file, then `AGRIBOUNDARY_*` variables
pub fn load_config(explicit: Option<&Path>) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    match config_path(explicit) {
        Some(path) if path.exists() => {
            config = config
                .load_from_file(&path)
                .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
        }
        Some(path) if explicit.is_some() => {
            bail!("Configuration file not found: {}", path.display());
        }
        _ => {}
    }

    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_config_with_overrides(
    explicit: Option<&Path>,
    overrides: CliConfigOverrides,
) -> Result<LayeredConfig> {
    let mut config = load_config(explicit)?;
    config.update_from_cli(overrides);
    Ok(config)
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir().ok().map(|dir| dir.join(DEFAULT_CONFIG_FILE)),
    }
}
