//! Command implementations

mod aoi;
mod config;
mod detect;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Detect(args) => detect::execute(args, config_path, &output).await,
        Commands::Aoi(args) => aoi::execute(args, config_path, &output).await,
        Commands::Config => config::execute(config_path, &output),
    }
}
