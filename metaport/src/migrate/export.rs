//! Export pipeline
//!
//! Pages through the source catalog for each selected kind, post-filters
//! each page against the precomputed selection, and streams matching
//! records to per-kind NDJSON files. Export only reads the remote side, so
//! kinds are processed in plain registry order with no dependency
//! constraint.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::api::client::CatalogApi;
use crate::api::resilience::RetryPolicy;
use crate::migrate::manifest::{Direction, TransferManifest};
use crate::migrate::ndjson::RecordWriter;
use crate::migrate::schema::EntityKind;
use crate::migrate::select::{self, SelectOptions, SelectionCriterion};

/// Manifest file name written into the output directory.
pub const EXPORT_MANIFEST_FILE: &str = "export_manifest.json";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    /// Wipe the output directory before exporting
    pub clear: bool,
    pub select: SelectOptions,
}

/// Export everything the criterion selects into `out_dir`.
pub async fn export_all(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    criterion: &SelectionCriterion,
    opts: &ExportOptions,
) -> Result<TransferManifest> {
    if opts.clear && opts.out_dir.exists() {
        info!("clearing export directory {}", opts.out_dir.display());
        std::fs::remove_dir_all(&opts.out_dir)
            .with_context(|| format!("failed to clear {}", opts.out_dir.display()))?;
    }
    std::fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("failed to create {}", opts.out_dir.display()))?;

    let selection = select::select(api, retry, criterion, &opts.select).await?;

    let mut manifest = TransferManifest::new(Direction::Export, api.endpoint(), false);
    let manifest_path = opts.out_dir.join(EXPORT_MANIFEST_FILE);

    let kinds: Vec<EntityKind> = selection.kinds().collect();
    for kind in kinds {
        manifest.touch(kind);
        let mut writer = RecordWriter::create(&opts.out_dir, kind)?;

        let mut token: Option<String> = None;
        loop {
            let page = retry
                .execute(&format!("list {kind}"), |_| {
                    let token = token.clone();
                    async move {
                        api.list_by_kind(kind, token.as_deref(), opts.select.page_size).await
                    }
                })
                .await?;
            for record in &page.records {
                if selection.contains_record(kind, record) {
                    writer.append(record)?;
                    manifest.record_export(kind, 1);
                }
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let written = writer.finish()?;
        info!("exported {written} {kind}");
        manifest.save(&manifest_path)?;
    }

    manifest.finish();
    manifest.save(&manifest_path)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resilience::RetryConfig;
    use crate::api::testkit::FakeCatalog;
    use crate::migrate::ndjson::{self, ParsedLine};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn retry() -> RetryPolicy {
        RetryPolicy::new(RetryConfig::disabled())
    }

    fn options(dir: &std::path::Path, kinds: &[EntityKind]) -> ExportOptions {
        ExportOptions {
            out_dir: dir.to_path_buf(),
            clear: false,
            select: SelectOptions {
                kinds: kinds.iter().copied().collect(),
                include_deleted: false,
                include_system_entities: false,
                page_size: 2,
            },
        }
    }

    #[tokio::test]
    async fn test_export_all_writes_files_and_counts() {
        let catalog = FakeCatalog::new("http://source:8585");
        for i in 0..5 {
            catalog.seed(EntityKind::Domain, json!({"name": format!("d{i}")}));
        }
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), &[EntityKind::Domain]);

        let manifest = export_all(&catalog, &retry(), &SelectionCriterion::All, &opts)
            .await
            .unwrap();

        assert_eq!(manifest.kinds[&EntityKind::Domain].exported, 5);
        let parsed =
            ndjson::read_records(&ndjson::kind_path(dir.path(), EntityKind::Domain)).unwrap();
        assert_eq!(parsed.len(), 5);
        assert!(parsed.iter().all(|p| matches!(p, ParsedLine::Record(_))));
        assert!(dir.path().join(EXPORT_MANIFEST_FILE).is_file());
    }

    #[tokio::test]
    async fn test_zero_match_kind_still_gets_file_and_entry() {
        let catalog = FakeCatalog::new("http://source:8585");
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), &[EntityKind::Glossary]);

        let manifest = export_all(&catalog, &retry(), &SelectionCriterion::All, &opts)
            .await
            .unwrap();

        assert_eq!(manifest.kinds[&EntityKind::Glossary].exported, 0);
        assert!(ndjson::kind_path(dir.path(), EntityKind::Glossary).is_file());
        // not requested, not present
        assert!(!manifest.kinds.contains_key(&EntityKind::Table));
    }

    #[tokio::test]
    async fn test_linked_export_post_filters_pages() {
        let catalog = FakeCatalog::new("http://source:8585");
        catalog.seed(EntityKind::Domain, json!({"name": "Finance"}));
        catalog.seed(EntityKind::Domain, json!({"name": "Marketing"}));
        catalog.seed(
            EntityKind::DataProduct,
            json!({"name": "P1", "domain": {"fullyQualifiedName": "Finance"}}),
        );
        catalog.seed(
            EntityKind::DataProduct,
            json!({"name": "P2", "domain": {"fullyQualifiedName": "Marketing"}}),
        );

        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), &[EntityKind::Domain, EntityKind::DataProduct]);
        let criterion = SelectionCriterion::Linked {
            domains: BTreeSet::from(["Finance".to_string()]),
            data_products: true,
            assets: false,
        };

        let manifest = export_all(&catalog, &retry(), &criterion, &opts).await.unwrap();

        assert_eq!(manifest.kinds[&EntityKind::Domain].exported, 1);
        assert_eq!(manifest.kinds[&EntityKind::DataProduct].exported, 1);
        let parsed =
            ndjson::read_records(&ndjson::kind_path(dir.path(), EntityKind::DataProduct)).unwrap();
        match &parsed[0] {
            ParsedLine::Record(record) => assert_eq!(record.name(), "P1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clear_removes_stale_files() {
        let catalog = FakeCatalog::new("http://source:8585");
        catalog.seed(EntityKind::Domain, json!({"name": "Finance"}));

        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("tables.ndjson");
        std::fs::write(&stale, "{\"name\":\"stale\"}\n").unwrap();

        let mut opts = options(dir.path(), &[EntityKind::Domain]);
        opts.clear = true;
        export_all(&catalog, &retry(), &SelectionCriterion::All, &opts).await.unwrap();

        assert!(!stale.exists());
        assert!(ndjson::kind_path(dir.path(), EntityKind::Domain).is_file());
    }
}
