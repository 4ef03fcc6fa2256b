//! AgriBoundary CLI - Command-line interface
//!
//! Upload an area of interest, pick a date window and segmentation settings,
//! and get candidate field boundaries back as KML or GeoJSON plus a map.

mod cli;
mod commands;
mod config_loader;
mod errors;
mod output;
mod output_types;
mod progress;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(commands::execute(cli)));

    if let Err(error) = result {
        let cli_error = errors::from_anyhow(error);
        if json {
            output::OutputWriter::new(true).error_details(&cli_error);
        } else {
            cli_error.display();
        }
        std::process::exit(1);
    }
}
