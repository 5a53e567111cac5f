//! Per-run transfer manifest
//!
//! The manifest is the single source of truth for what a run did: per-kind
//! counts, per-record errors, endpoints, and timestamps. It is accumulated
//! append-only by a single writer and persisted incrementally so a crashed
//! run still leaves a consistent prefix on disk.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::migrate::schema::EntityKind;

/// Which way records moved this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Export,
    Import,
}

/// Why a record was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Record already exists on the target and updates are disabled
    Exists,
    /// A reference field did not resolve to a target record
    UnresolvedReference { kind: EntityKind, name: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Exists => write!(f, "already exists and update_existing is disabled"),
            SkipReason::UnresolvedReference { kind, name } => {
                write!(f, "unresolved reference to {kind} '{name}'")
            }
        }
    }
}

/// Outcome of one imported record. Every input record yields exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ImportOutcome {
    Created,
    Updated,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

/// One record's failure entry in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub identifier: String,
    pub message: String,
}

/// Per-kind counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    #[serde(default)]
    pub exported: u64,
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
    /// Stub records created to satisfy missing references
    #[serde(default)]
    pub dependencies_created: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RecordFailure>,
}

/// The per-run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferManifest {
    pub direction: Direction,
    pub endpoint: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kinds: BTreeMap<EntityKind, KindSummary>,
}

impl TransferManifest {
    pub fn new(direction: Direction, endpoint: impl Into<String>, dry_run: bool) -> Self {
        Self {
            direction,
            endpoint: endpoint.into(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            kinds: BTreeMap::new(),
        }
    }

    /// Ensure a kind has an entry, marking it as requested even with zero
    /// records.
    pub fn touch(&mut self, kind: EntityKind) {
        self.kinds.entry(kind).or_default();
    }

    pub fn record_export(&mut self, kind: EntityKind, count: u64) {
        self.kinds.entry(kind).or_default().exported += count;
    }

    pub fn record_export_error(&mut self, kind: EntityKind, identifier: &str, message: &str) {
        let summary = self.kinds.entry(kind).or_default();
        summary.failed += 1;
        summary.errors.push(RecordFailure {
            identifier: identifier.to_string(),
            message: message.to_string(),
        });
    }

    /// Append one record outcome. Skips caused by unresolved references and
    /// failures also land in the error list so the manifest names every
    /// record that did not transfer cleanly.
    pub fn record_outcome(&mut self, kind: EntityKind, identifier: &str, outcome: &ImportOutcome) {
        let summary = self.kinds.entry(kind).or_default();
        match outcome {
            ImportOutcome::Created => {
                summary.created += 1;
                summary.imported += 1;
            }
            ImportOutcome::Updated => {
                summary.updated += 1;
                summary.imported += 1;
            }
            ImportOutcome::Skipped { reason } => {
                summary.skipped += 1;
                if matches!(reason, SkipReason::UnresolvedReference { .. }) {
                    summary.errors.push(RecordFailure {
                        identifier: identifier.to_string(),
                        message: reason.to_string(),
                    });
                }
            }
            ImportOutcome::Failed { error } => {
                summary.failed += 1;
                summary.errors.push(RecordFailure {
                    identifier: identifier.to_string(),
                    message: error.clone(),
                });
            }
        }
    }

    pub fn record_dependency_created(&mut self, kind: EntityKind) {
        self.kinds.entry(kind).or_default().dependencies_created += 1;
    }

    /// A run with any FAILED outcome is a non-success even when it did not
    /// abort.
    pub fn has_failures(&self) -> bool {
        self.kinds.values().any(|summary| summary.failed > 0)
    }

    pub fn total_exported(&self) -> u64 {
        self.kinds.values().map(|s| s.exported).sum()
    }

    pub fn total_imported(&self) -> u64 {
        self.kinds.values().map(|s| s.imported).sum()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Persist to disk. Called after every kind phase and at run end, so the
    /// on-disk manifest always reflects a consistent prefix of the run.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write manifest {}", path.display()))
    }
}
