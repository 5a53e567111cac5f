//! metaport: selective, dependency-aware migration of metadata catalog
//! entities between two catalog instances.

mod api;
mod cli;
mod config;
mod migrate;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    let config = config::MigrationConfig::load(&cli.config)?;

    let success = match &cli.command {
        cli::Command::Export(args) => cli::commands::export::run(args, &config).await?,
        cli::Command::Import(args) => cli::commands::import::run(args, &config).await?,
    };

    // Failed record outcomes surface as a non-success run even when the
    // process did not abort.
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
