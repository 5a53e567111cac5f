//! Selection filter
//!
//! Computes the exact subset of records to transfer for a run: everything,
//! an explicit name list, or the entities linked to a set of root domains.
//! Selection only reads the catalog; identical catalog state and criterion
//! always produce the identical selected set, which is what makes retries
//! and re-runs safe.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use uuid::Uuid;

use crate::api::client::CatalogApi;
use crate::api::error::ApiError;
use crate::api::models::EntityRecord;
use crate::api::resilience::RetryPolicy;
use crate::migrate::schema::EntityKind;

/// What to transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCriterion {
    /// Every record of every requested kind
    All,
    /// Named records per kind
    Explicit(BTreeMap<EntityKind, BTreeSet<String>>),
    /// Records linked to a set of root domains through configured
    /// one-hop reference relationships
    Linked {
        domains: BTreeSet<String>,
        /// Include data products referencing a selected domain
        data_products: bool,
        /// Include assets referencing a selected domain or data product
        assets: bool,
    },
}

/// Flags narrowing what a scan considers a candidate.
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Kinds the run asked for (`entities.*` config)
    pub kinds: BTreeSet<EntityKind>,
    pub include_deleted: bool,
    pub include_system_entities: bool,
    pub page_size: usize,
}

/// The computed subset: record identifiers per kind, plus the matching
/// names used when reference fields are intersected against the selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: BTreeMap<EntityKind, BTreeSet<Uuid>>,
    names: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl Selection {
    /// Kinds with a selection entry, including empty ones (a kind that was
    /// scanned but matched nothing is distinct from a kind never requested).
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.ids.keys().copied()
    }

    pub fn ids(&self, kind: EntityKind) -> Option<&BTreeSet<Uuid>> {
        self.ids.get(&kind)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.ids.get(&kind).map_or(0, BTreeSet::len)
    }

    /// Post-filter check used by the export pipeline on every listed page.
    pub fn contains_record(&self, kind: EntityKind, record: &EntityRecord) -> bool {
        match record.id() {
            Some(id) => self.ids.get(&kind).is_some_and(|ids| ids.contains(&id)),
            None => self.contains_name(kind, record.fqn()),
        }
    }

    fn contains_name(&self, kind: EntityKind, name: &str) -> bool {
        self.names.get(&kind).is_some_and(|names| names.contains(name))
    }

    fn touch(&mut self, kind: EntityKind) {
        self.ids.entry(kind).or_default();
        self.names.entry(kind).or_default();
    }

    fn insert(&mut self, kind: EntityKind, record: &EntityRecord) {
        if let Some(id) = record.id() {
            self.ids.entry(kind).or_default().insert(id);
        }
        let names = self.names.entry(kind).or_default();
        names.insert(record.name().to_string());
        names.insert(record.fqn().to_string());
    }
}

/// Selection failure.
#[derive(Debug)]
pub enum SelectError {
    /// Names that resolved to no record, collected across all kinds so a
    /// user sees every bad name in one pass.
    UnresolvedNames(Vec<(EntityKind, String)>),
    Api(ApiError),
}

impl std::fmt::Display for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectError::UnresolvedNames(names) => {
                let listed: Vec<String> =
                    names.iter().map(|(kind, name)| format!("{kind}:'{name}'")).collect();
                write!(f, "selection names with no match: {}", listed.join(", "))
            }
            SelectError::Api(err) => write!(f, "selection failed: {err}"),
        }
    }
}

impl std::error::Error for SelectError {}

impl From<ApiError> for SelectError {
    fn from(err: ApiError) -> Self {
        SelectError::Api(err)
    }
}

/// Linked-relationship scans in dependency order: a product selected in an
/// earlier scan can make an asset eligible in a later one (the two-hop
/// cascade the linkage flags expose).
const LINKED_SCANS: &[(EntityKind, LinkedHop)] = &[
    (EntityKind::DataProduct, LinkedHop::Products),
    (EntityKind::Database, LinkedHop::Assets),
    (EntityKind::Table, LinkedHop::Assets),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkedHop {
    Products,
    Assets,
}

/// Compute the selection for `criterion` against the source catalog.
pub async fn select(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    criterion: &SelectionCriterion,
    opts: &SelectOptions,
) -> Result<Selection, SelectError> {
    match criterion {
        SelectionCriterion::All => select_all(api, retry, opts).await,
        SelectionCriterion::Explicit(names) => select_explicit(api, retry, opts, names).await,
        SelectionCriterion::Linked { domains, data_products, assets } => {
            select_linked(api, retry, opts, domains, *data_products, *assets).await
        }
    }
}

fn passes_flags(record: &EntityRecord, opts: &SelectOptions) -> bool {
    (opts.include_deleted || !record.is_deleted())
        && (opts.include_system_entities || !record.is_system())
}

/// Page through every record of a kind, invoking `visit` per record.
async fn scan_kind(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    kind: EntityKind,
    page_size: usize,
    mut visit: impl FnMut(&EntityRecord),
) -> Result<(), ApiError> {
    let mut token: Option<String> = None;
    loop {
        let page = retry
            .execute(&format!("list {kind}"), |_| {
                let token = token.clone();
                async move { api.list_by_kind(kind, token.as_deref(), page_size).await }
            })
            .await?;
        for record in &page.records {
            visit(record);
        }
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => return Ok(()),
        }
    }
}

async fn select_all(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    opts: &SelectOptions,
) -> Result<Selection, SelectError> {
    let mut selection = Selection::default();
    for kind in &opts.kinds {
        selection.touch(*kind);
        scan_kind(api, retry, *kind, opts.page_size, |record| {
            if passes_flags(record, opts) {
                selection.insert(*kind, record);
            }
        })
        .await?;
        info!("selected {} {kind}", selection.count(*kind));
    }
    Ok(selection)
}

/// Resolve explicit names for one kind, removing hits from `remaining`.
async fn resolve_names(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    kind: EntityKind,
    page_size: usize,
    remaining: &mut BTreeSet<String>,
    selection: &mut Selection,
) -> Result<(), ApiError> {
    selection.touch(kind);
    scan_kind(api, retry, kind, page_size, |record| {
        if remaining.remove(record.fqn()) || remaining.remove(record.name()) {
            selection.insert(kind, record);
        }
    })
    .await
}

async fn select_explicit(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    opts: &SelectOptions,
    names: &BTreeMap<EntityKind, BTreeSet<String>>,
) -> Result<Selection, SelectError> {
    let mut selection = Selection::default();
    let mut unresolved = Vec::new();
    for (kind, requested) in names {
        let mut remaining = requested.clone();
        resolve_names(api, retry, *kind, opts.page_size, &mut remaining, &mut selection).await?;
        unresolved.extend(remaining.into_iter().map(|name| (*kind, name)));
    }
    if !unresolved.is_empty() {
        return Err(SelectError::UnresolvedNames(unresolved));
    }
    Ok(selection)
}

async fn select_linked(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    opts: &SelectOptions,
    domains: &BTreeSet<String>,
    data_products: bool,
    assets: bool,
) -> Result<Selection, SelectError> {
    let mut selection = Selection::default();

    // Root resolution is an explicit selection of the named domains.
    let mut remaining = domains.clone();
    resolve_names(api, retry, EntityKind::Domain, opts.page_size, &mut remaining, &mut selection)
        .await?;
    if !remaining.is_empty() {
        return Err(SelectError::UnresolvedNames(
            remaining.into_iter().map(|name| (EntityKind::Domain, name)).collect(),
        ));
    }

    for (kind, hop) in LINKED_SCANS {
        let enabled = match hop {
            LinkedHop::Products => data_products,
            LinkedHop::Assets => assets,
        };
        if !enabled || !opts.kinds.contains(kind) {
            continue;
        }
        selection.touch(*kind);
        // One pass per relationship: include records whose reference fields
        // intersect the names already selected for the referenced kind.
        let mut hits = Vec::new();
        scan_kind(api, retry, *kind, opts.page_size, |record| {
            if !passes_flags(record, opts) {
                return;
            }
            let linked = record
                .references(*kind)
                .iter()
                .any(|(target, name)| selection.contains_name(*target, name));
            if linked {
                hits.push(record.clone());
            }
        })
        .await?;
        for record in &hits {
            selection.insert(*kind, record);
        }
        info!("linked selection: {} {kind}", selection.count(*kind));
    }

    Ok(selection)
}
