//! Dependency-aware selective migration engine
//!
//! The core of the tool: deciding which records move (selection), in what
//! order (dependency ordering over the kind registry), and replaying them
//! idempotently (export/import pipelines with a per-run manifest).

pub mod export;
pub mod import;
pub mod manifest;
pub mod ndjson;
pub mod order;
pub mod schema;
pub mod select;

pub use export::{EXPORT_MANIFEST_FILE, ExportOptions, export_all};
pub use import::{CancelFlag, IMPORT_MANIFEST_FILE, ImportOptions, import_all};
pub use manifest::{Direction, ImportOutcome, SkipReason, TransferManifest};
pub use order::{OrderError, import_order, import_order_with_hint};
pub use schema::{EntityKind, UnknownKind};
pub use select::{SelectOptions, Selection, SelectionCriterion, select};
