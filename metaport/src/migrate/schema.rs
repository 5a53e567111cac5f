//! Static entity kind registry
//!
//! Describes every catalog entity kind the tool can move: its wire name,
//! the reference fields pointing at other kinds, and whether it acts as a
//! container (a grouping entity other kinds link into). The registry is
//! process-wide, read-only, and the single source of truth for the
//! cross-kind dependency graph.

use serde::{Deserialize, Serialize};

/// A catalog entity kind.
///
/// Declaration order is meaningful: it is the tie-break used by the
/// dependency orderer, so kinds are declared roughly parents-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "teams")]
    Team,
    #[serde(rename = "users")]
    User,
    #[serde(rename = "policies")]
    Policy,
    #[serde(rename = "domains")]
    Domain,
    #[serde(rename = "glossaries")]
    Glossary,
    #[serde(rename = "glossary_terms")]
    GlossaryTerm,
    #[serde(rename = "data_products")]
    DataProduct,
    #[serde(rename = "database_services")]
    DatabaseService,
    #[serde(rename = "databases")]
    Database,
    #[serde(rename = "database_schemas")]
    DatabaseSchema,
    #[serde(rename = "tables")]
    Table,
}

/// A reference field on an entity kind's payload pointing at another kind.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceField {
    /// Payload key holding the reference (e.g. "domain", "databaseSchema")
    pub field: &'static str,
    /// Kind the reference points at
    pub target: EntityKind,
    /// Whether the field holds a list of references instead of a single one
    pub many: bool,
}

/// Registry entry for one entity kind.
#[derive(Debug)]
pub struct KindSpec {
    pub kind: EntityKind,
    pub references: &'static [ReferenceField],
    /// Container kinds group other entities (selection roots)
    pub container: bool,
}

const fn one(field: &'static str, target: EntityKind) -> ReferenceField {
    ReferenceField { field, target, many: false }
}

const fn many(field: &'static str, target: EntityKind) -> ReferenceField {
    ReferenceField { field, target, many: true }
}

/// The fixed definition table. Within-kind references (team parents, domain
/// parents) are deliberately absent: only cross-kind edges drive import
/// ordering, and a self-edge would read as a cycle.
static REGISTRY: &[KindSpec] = &[
    KindSpec { kind: EntityKind::Team, references: &[], container: false },
    KindSpec {
        kind: EntityKind::User,
        references: &[many("teams", EntityKind::Team)],
        container: false,
    },
    KindSpec { kind: EntityKind::Policy, references: &[], container: false },
    KindSpec { kind: EntityKind::Domain, references: &[], container: true },
    KindSpec { kind: EntityKind::Glossary, references: &[], container: false },
    KindSpec {
        kind: EntityKind::GlossaryTerm,
        references: &[one("glossary", EntityKind::Glossary)],
        container: false,
    },
    KindSpec {
        kind: EntityKind::DataProduct,
        references: &[one("domain", EntityKind::Domain)],
        container: true,
    },
    KindSpec { kind: EntityKind::DatabaseService, references: &[], container: false },
    KindSpec {
        kind: EntityKind::Database,
        references: &[
            one("service", EntityKind::DatabaseService),
            one("domain", EntityKind::Domain),
        ],
        container: false,
    },
    KindSpec {
        kind: EntityKind::DatabaseSchema,
        references: &[one("database", EntityKind::Database)],
        container: false,
    },
    KindSpec {
        kind: EntityKind::Table,
        references: &[
            one("databaseSchema", EntityKind::DatabaseSchema),
            one("domain", EntityKind::Domain),
            many("dataProducts", EntityKind::DataProduct),
        ],
        container: false,
    },
];

/// Error for a kind name that is not in the registry (bad configuration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl std::fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown entity kind '{}' (expected one of: {})",
            self.0,
            all_kinds().iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
        )
    }
}

impl std::error::Error for UnknownKind {}

impl EntityKind {
    /// Wire/file name (plural snake_case, matches NDJSON file stems and
    /// `entities.*` config keys).
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Team => "teams",
            EntityKind::User => "users",
            EntityKind::Policy => "policies",
            EntityKind::Domain => "domains",
            EntityKind::Glossary => "glossaries",
            EntityKind::GlossaryTerm => "glossary_terms",
            EntityKind::DataProduct => "data_products",
            EntityKind::DatabaseService => "database_services",
            EntityKind::Database => "databases",
            EntityKind::DatabaseSchema => "database_schemas",
            EntityKind::Table => "tables",
        }
    }

    /// REST collection route on the catalog service.
    pub fn route(&self) -> &'static str {
        match self {
            EntityKind::Team => "teams",
            EntityKind::User => "users",
            EntityKind::Policy => "policies",
            EntityKind::Domain => "domains",
            EntityKind::Glossary => "glossaries",
            EntityKind::GlossaryTerm => "glossaryTerms",
            EntityKind::DataProduct => "dataProducts",
            EntityKind::DatabaseService => "services/databaseServices",
            EntityKind::Database => "databases",
            EntityKind::DatabaseSchema => "databaseSchemas",
            EntityKind::Table => "tables",
        }
    }

    /// Parse a kind from its wire name.
    pub fn parse(name: &str) -> Result<Self, UnknownKind> {
        all_kinds()
            .iter()
            .copied()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| UnknownKind(name.to_string()))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All registered kinds in declaration order.
pub fn all_kinds() -> &'static [EntityKind] {
    use once_cell::sync::Lazy;
    static KINDS: Lazy<Vec<EntityKind>> =
        Lazy::new(|| REGISTRY.iter().map(|spec| spec.kind).collect());
    &KINDS
}

fn spec_of(kind: EntityKind) -> &'static KindSpec {
    // Every variant has a registry row; the enum and table are declared together.
    REGISTRY
        .iter()
        .find(|spec| spec.kind == kind)
        .unwrap_or_else(|| unreachable!("kind {kind} missing from registry"))
}

/// Reference fields declared for a kind.
pub fn references_of(kind: EntityKind) -> &'static [ReferenceField] {
    spec_of(kind).references
}

/// Distinct kinds a kind depends on (cross-kind edges of the dependency graph).
pub fn referenced_kinds(kind: EntityKind) -> Vec<EntityKind> {
    let mut targets: Vec<EntityKind> =
        references_of(kind).iter().map(|r| r.target).collect();
    targets.sort();
    targets.dedup();
    targets
}

/// Whether a kind is a container (grouping entity usable as a selection root).
pub fn is_container(kind: EntityKind) -> bool {
    spec_of(kind).container
}

/// Position of a kind in declaration order (orderer tie-break).
pub fn declaration_index(kind: EntityKind) -> usize {
    REGISTRY
        .iter()
        .position(|spec| spec.kind == kind)
        .unwrap_or_else(|| unreachable!("kind {kind} missing from registry"))
}
