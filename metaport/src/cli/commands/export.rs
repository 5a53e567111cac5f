//! Export command handler

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::api::{CatalogClient, RetryPolicy};
use crate::config::MigrationConfig;
use crate::migrate::export::{self, ExportOptions};
use crate::migrate::schema::EntityKind;
use crate::migrate::select::SelectOptions;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Override the configured output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Export only these entity kinds (repeatable)
    #[arg(short, long = "entities", value_name = "KIND")]
    pub entities: Vec<String>,

    /// Clear the output directory before exporting
    #[arg(long)]
    pub clear: bool,
}

pub async fn run(args: &ExportArgs, config: &MigrationConfig) -> Result<bool> {
    let kinds: BTreeSet<EntityKind> = if args.entities.is_empty() {
        config.enabled_kinds()?
    } else {
        args.entities
            .iter()
            .map(|name| EntityKind::parse(name))
            .collect::<Result<_, _>>()?
    };

    let client = CatalogClient::new(&config.source.url, config.source.token.clone());
    let retry = RetryPolicy::new(config.resilience().retry);
    let out_dir =
        args.output_dir.clone().unwrap_or_else(|| config.export.output_dir.clone());

    let opts = ExportOptions {
        out_dir,
        clear: args.clear,
        select: SelectOptions {
            kinds,
            include_deleted: config.include_deleted,
            include_system_entities: config.include_system_entities,
            page_size: config.batch_size,
        },
    };

    info!("exporting from {}", config.source.url);
    let manifest = export::export_all(&client, &retry, &config.criterion(), &opts).await?;

    info!(
        "export finished: {} records into {}",
        manifest.total_exported(),
        opts.out_dir.display()
    );
    for (kind, summary) in &manifest.kinds {
        info!("  {kind}: {}", summary.exported);
    }
    Ok(!manifest.has_failures())
}
