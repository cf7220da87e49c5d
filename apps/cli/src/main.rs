//! Prospector CLI: buyer-group discovery under a metered provider budget.
//!
//! Reads a list of target companies, finds and verifies executive contacts
//! across the configured data providers, and writes one record per company.

mod commands;
mod input;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
