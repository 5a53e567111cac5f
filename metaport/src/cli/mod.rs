//! Command-line interface

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config;

#[derive(Debug, Parser)]
#[command(
    name = "metaport",
    about = "Migrate metadata catalog entities between instances",
    version
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export entities from the source catalog to NDJSON files
    Export(commands::export::ExportArgs),
    /// Import NDJSON files into the target catalog
    Import(commands::import::ImportArgs),
}
