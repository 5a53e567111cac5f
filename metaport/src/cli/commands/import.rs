//! Import command handler

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::{info, warn};

use crate::api::{CatalogClient, RetryPolicy, WorkerLimiter};
use crate::config::MigrationConfig;
use crate::migrate::import::{self, CancelFlag, ImportOptions};
use crate::migrate::schema::EntityKind;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Override the configured input directory
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,

    /// Import only these entity kinds (repeatable)
    #[arg(short, long = "entities", value_name = "KIND")]
    pub entities: Vec<String>,

    /// Resolve and classify everything without writing to the target
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: &ImportArgs, config: &MigrationConfig) -> Result<bool> {
    let kinds: BTreeSet<EntityKind> = if args.entities.is_empty() {
        config.enabled_kinds()?
    } else {
        args.entities
            .iter()
            .map(|name| EntityKind::parse(name))
            .collect::<Result<_, _>>()?
    };

    let client = CatalogClient::new(&config.target.url, config.target.token.clone());
    let resilience = config.resilience();
    let retry = RetryPolicy::new(resilience.retry);
    let limiter = WorkerLimiter::new(&resilience.workers);

    // Interrupt stops scheduling new records; in-flight work drains and the
    // manifest flushes a consistent prefix.
    let cancel = CancelFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight records");
            signal_flag.cancel();
        }
    });

    let opts = ImportOptions {
        in_dir: args.input_dir.clone().unwrap_or_else(|| config.import.input_dir.clone()),
        kinds: Some(kinds),
        batch_size: config.batch_size,
        update_existing: config.import.update_existing,
        skip_on_error: config.import.skip_on_error,
        create_missing_dependencies: config.import.create_missing_dependencies,
        order_hint: config.order_hint()?,
        dry_run: args.dry_run,
    };

    info!("importing into {}", config.target.url);
    let manifest = import::import_all(&client, &retry, &limiter, &cancel, &opts).await?;

    info!("import finished: {} records applied", manifest.total_imported());
    for (kind, summary) in &manifest.kinds {
        info!(
            "  {kind}: {} created, {} updated, {} skipped, {} failed",
            summary.created, summary.updated, summary.skipped, summary.failed
        );
    }
    if manifest.has_failures() {
        warn!("run completed with failed records; see the import manifest");
    }
    Ok(!manifest.has_failures())
}
