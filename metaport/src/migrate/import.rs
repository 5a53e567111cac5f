//! Import pipeline
//!
//! Replays exported records into the target catalog in dependency order.
//! Kind phases are hard synchronization points: every record of a kind
//! finishes (success, skip, or abort) before any dependent kind starts, so
//! later phases can resolve references created earlier. Within a phase,
//! records are independent and run in parallel under the worker limiter.
//!
//! All writes are idempotent upserts keyed on fully-qualified name, which is
//! what makes re-running an interrupted import safe.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use serde_json::{Value, json};

use crate::api::client::CatalogApi;
use crate::api::error::ApiError;
use crate::api::models::EntityRecord;
use crate::api::resilience::{RetryPolicy, WorkerLimiter};
use crate::migrate::manifest::{Direction, ImportOutcome, SkipReason, TransferManifest};
use crate::migrate::ndjson::{self, ParsedLine};
use crate::migrate::order;
use crate::migrate::schema::EntityKind;

/// Manifest file name written into the input directory.
pub const IMPORT_MANIFEST_FILE: &str = "import_manifest.json";

/// Cooperative run-level cancellation. Cancelling stops new records from
/// being scheduled; in-flight operations complete and the manifest flushes,
/// so the on-disk state is a consistent prefix of the run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub in_dir: PathBuf,
    /// Restrict to these kinds; `None` imports every discovered file
    pub kinds: Option<BTreeSet<EntityKind>>,
    pub batch_size: usize,
    /// Update records that already exist on the target (otherwise SKIPPED)
    pub update_existing: bool,
    /// Keep going after a failed record instead of aborting the run
    pub skip_on_error: bool,
    /// Create one-level placeholder records for unresolved references
    pub create_missing_dependencies: bool,
    /// Validated override of the computed import order
    pub order_hint: Option<Vec<EntityKind>>,
    /// Resolve and classify everything but write nothing
    pub dry_run: bool,
}

/// Outcome of one input record, plus any dependency stubs created for it.
struct RecordResult {
    identifier: String,
    outcome: ImportOutcome,
    deps_created: Vec<EntityKind>,
}

/// Import every discovered record file from `opts.in_dir`.
pub async fn import_all(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    limiter: &WorkerLimiter,
    cancel: &CancelFlag,
    opts: &ImportOptions,
) -> Result<TransferManifest> {
    let discovered = ndjson::discover_kinds(&opts.in_dir);
    let present: BTreeSet<EntityKind> = discovered
        .iter()
        .copied()
        .filter(|kind| opts.kinds.as_ref().is_none_or(|requested| requested.contains(kind)))
        .collect();
    if present.is_empty() {
        bail!("no record files found in {}", opts.in_dir.display());
    }

    // Ordering failures are configuration/data errors: abort before any
    // remote write.
    let phases = match &opts.order_hint {
        Some(hint) => order::import_order_with_hint(&present, hint)?,
        None => order::import_order(&present)?,
    };
    info!(
        "import order: {}",
        phases.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(" -> ")
    );
    if opts.dry_run {
        info!("dry run: no records will be written");
    }

    let mut manifest = TransferManifest::new(Direction::Import, api.endpoint(), opts.dry_run);
    let manifest_path = opts.in_dir.join(IMPORT_MANIFEST_FILE);

    'phases: for kind in phases {
        manifest.touch(kind);
        let lines = ndjson::read_records(&ndjson::kind_path(&opts.in_dir, kind))
            .with_context(|| format!("failed to read {kind} records"))?;
        info!("importing {} {kind}", lines.len());

        for batch in lines.chunks(opts.batch_size.max(1)) {
            if cancel.is_cancelled() {
                warn!("cancellation requested, not scheduling further {kind} records");
                break 'phases;
            }

            let mut results = stream::iter(
                batch.iter().map(|line| process_line(api, retry, limiter, kind, line, opts)),
            )
            .buffer_unordered(limiter.max_workers());

            // This loop is the single manifest writer; workers only return
            // outcomes.
            while let Some(result) = results.next().await {
                for dep_kind in &result.deps_created {
                    manifest.record_dependency_created(*dep_kind);
                }
                manifest.record_outcome(kind, &result.identifier, &result.outcome);

                let fatal = !opts.skip_on_error
                    && matches!(
                        &result.outcome,
                        ImportOutcome::Failed { .. }
                            | ImportOutcome::Skipped {
                                reason: SkipReason::UnresolvedReference { .. }
                            }
                    );
                if fatal {
                    manifest.finish();
                    manifest.save(&manifest_path)?;
                    bail!(
                        "import aborted on {kind} '{}' ({:?}); manifest flushed to {}",
                        result.identifier,
                        result.outcome,
                        manifest_path.display()
                    );
                }
            }
        }
        manifest.save(&manifest_path)?;
    }

    manifest.finish();
    manifest.save(&manifest_path)?;
    Ok(manifest)
}

async fn process_line(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    limiter: &WorkerLimiter,
    kind: EntityKind,
    line: &ParsedLine,
    opts: &ImportOptions,
) -> RecordResult {
    match line {
        // Malformed lines still yield an outcome, never a silent drop.
        ParsedLine::Invalid { line, message } => RecordResult {
            identifier: format!("line {line}"),
            outcome: ImportOutcome::Failed { error: format!("malformed record: {message}") },
            deps_created: Vec::new(),
        },
        ParsedLine::Record(record) => {
            let _permit = limiter.acquire().await;
            import_record(api, retry, kind, record, opts).await
        }
    }
}

async fn import_record(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    kind: EntityKind,
    record: &EntityRecord,
    opts: &ImportOptions,
) -> RecordResult {
    let identifier = record.fqn().to_string();
    let mut deps_created = Vec::new();

    // Every cross-kind reference must resolve on the target before the
    // record itself is written.
    for (target, name) in record.references(kind) {
        match resolve_reference(api, retry, target, &name, opts, &mut deps_created).await {
            Ok(true) => {}
            Ok(false) => {
                return RecordResult {
                    identifier,
                    outcome: ImportOutcome::Skipped {
                        reason: SkipReason::UnresolvedReference { kind: target, name },
                    },
                    deps_created,
                };
            }
            Err(err) => {
                return RecordResult {
                    identifier,
                    outcome: ImportOutcome::Failed { error: err.to_string() },
                    deps_created,
                };
            }
        }
    }

    match upsert_record(api, retry, kind, record, opts).await {
        Ok(outcome) => RecordResult { identifier, outcome, deps_created },
        Err(err) => RecordResult {
            identifier,
            outcome: ImportOutcome::Failed { error: err.to_string() },
            deps_created,
        },
    }
}

/// Resolve one reference by name, optionally creating a placeholder.
/// Returns whether the reference now resolves.
async fn resolve_reference(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    target: EntityKind,
    name: &str,
    opts: &ImportOptions,
    deps_created: &mut Vec<EntityKind>,
) -> Result<bool, ApiError> {
    let existing = retry
        .execute(&format!("resolve {target} '{name}'"), |_| async move {
            api.get_by_name(target, name).await
        })
        .await?;
    if existing.is_some() {
        return Ok(true);
    }
    if !opts.create_missing_dependencies {
        return Ok(false);
    }
    if opts.dry_run {
        deps_created.push(target);
        return Ok(true);
    }

    // Best-effort placeholder, bounded to one level: the stub's own
    // references are not resolved in turn.
    let stub = stub_payload(target, name);
    retry
        .execute(&format!("create missing {target} '{name}'"), |attempt| {
            let stub = stub.clone();
            async move {
                if attempt > 1 {
                    if let Some(existing) = api.get_by_name(target, name).await? {
                        return Ok(existing);
                    }
                }
                api.create(target, stub).await
            }
        })
        .await?;
    info!("created missing dependency {target} '{name}'");
    deps_created.push(target);
    Ok(true)
}

/// Minimal creatable payload for a missing referenced record.
fn stub_payload(kind: EntityKind, fqn: &str) -> Value {
    let name = fqn.rsplit('.').next().unwrap_or(fqn);
    let mut payload = json!({
        "name": name,
        "description": format!("Placeholder created during import for '{fqn}'"),
    });
    // Domains require a type on creation.
    if kind == EntityKind::Domain {
        payload["domainType"] = json!("Aggregate");
    }
    payload
}

/// Idempotent upsert keyed on fully-qualified name.
async fn upsert_record(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    kind: EntityKind,
    record: &EntityRecord,
    opts: &ImportOptions,
) -> Result<ImportOutcome, ApiError> {
    let fqn = record.fqn();
    let existing = retry
        .execute(&format!("lookup {kind} '{fqn}'"), |_| async move {
            api.get_by_name(kind, fqn).await
        })
        .await?;
    let payload = record.write_payload(kind);

    match existing {
        Some(remote) => {
            if !opts.update_existing {
                return Ok(ImportOutcome::Skipped { reason: SkipReason::Exists });
            }
            if opts.dry_run {
                return Ok(ImportOutcome::Updated);
            }
            let Some(id) = remote.id() else {
                return Err(ApiError::Terminal {
                    status: None,
                    message: format!("existing {kind} '{fqn}' has no identifier"),
                });
            };
            retry
                .execute(&format!("update {kind} '{fqn}'"), |_| {
                    let payload = payload.clone();
                    async move { api.update(kind, id, payload).await }
                })
                .await?;
            Ok(ImportOutcome::Updated)
        }
        None => {
            if opts.dry_run {
                return Ok(ImportOutcome::Created);
            }
            // A replayed create re-checks existence first: a timed-out
            // create that actually landed must read as success, not as a
            // duplicate-name failure.
            retry
                .execute(&format!("create {kind} '{fqn}'"), |attempt| {
                    let payload = payload.clone();
                    async move {
                        if attempt > 1 {
                            if let Some(existing) = api.get_by_name(kind, fqn).await? {
                                return Ok(existing);
                            }
                        }
                        api.create(kind, payload).await
                    }
                })
                .await?;
            Ok(ImportOutcome::Created)
        }
    }
}
