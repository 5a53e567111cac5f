//! Dependency ordering for import phases
//!
//! Produces a total order over entity kinds such that every kind appears
//! after all kinds it references, so records written in an earlier phase are
//! resolvable by the time their referents are imported. Ordering failures are
//! configuration/data errors and abort a run before any remote write.

use std::collections::{BTreeMap, BTreeSet};

use crate::migrate::schema::{self, EntityKind};

/// Ordering failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The reference graph over the requested kinds has no topological order.
    CyclicDependency { members: Vec<EntityKind> },
    /// A user-supplied import order lists a kind before one it references.
    InvalidHint { kind: EntityKind, must_follow: EntityKind },
    /// A user-supplied import order lists a kind twice.
    DuplicateInHint { kind: EntityKind },
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::CyclicDependency { members } => {
                let names: Vec<_> = members.iter().map(|k| k.as_str()).collect();
                write!(f, "cyclic dependency between entity kinds: {}", names.join(" <-> "))
            }
            OrderError::InvalidHint { kind, must_follow } => write!(
                f,
                "import_order lists '{kind}' before '{must_follow}', which it references"
            ),
            OrderError::DuplicateInHint { kind } => {
                write!(f, "import_order lists '{kind}' more than once")
            }
        }
    }
}

impl std::error::Error for OrderError {}

/// Compute the import order for the given kinds from the registry graph.
/// Ties are broken by registry declaration order for reproducibility.
pub fn import_order(kinds: &BTreeSet<EntityKind>) -> Result<Vec<EntityKind>, OrderError> {
    toposort(kinds, &schema::referenced_kinds, &|kind| {
        (usize::MAX, schema::declaration_index(kind))
    })
}

/// Compute the import order honoring a user-supplied hint.
///
/// The hint is validated against the registry graph, never trusted blindly:
/// a hint that contradicts the graph is rejected. Valid hint entries act as a
/// priority among kinds whose dependencies are already placed; kinds absent
/// from the hint sort after hinted ones, in declaration order.
pub fn import_order_with_hint(
    kinds: &BTreeSet<EntityKind>,
    hint: &[EntityKind],
) -> Result<Vec<EntityKind>, OrderError> {
    let mut position = BTreeMap::new();
    for (index, kind) in hint.iter().enumerate() {
        if position.insert(*kind, index).is_some() {
            return Err(OrderError::DuplicateInHint { kind: *kind });
        }
    }

    // The hint must itself respect the graph among the kinds it names.
    for (kind, index) in &position {
        for target in schema::referenced_kinds(*kind) {
            if let Some(target_index) = position.get(&target) {
                if target_index > index {
                    return Err(OrderError::InvalidHint { kind: *kind, must_follow: target });
                }
            }
        }
    }

    toposort(kinds, &schema::referenced_kinds, &|kind| {
        (
            position.get(&kind).copied().unwrap_or(usize::MAX),
            schema::declaration_index(kind),
        )
    })
}

/// Kahn's algorithm restricted to `kinds`, selecting among zero-in-degree
/// candidates by the smallest `priority` key.
fn toposort(
    kinds: &BTreeSet<EntityKind>,
    edges: &dyn Fn(EntityKind) -> Vec<EntityKind>,
    priority: &dyn Fn(EntityKind) -> (usize, usize),
) -> Result<Vec<EntityKind>, OrderError> {
    let mut pending: BTreeMap<EntityKind, BTreeSet<EntityKind>> = kinds
        .iter()
        .map(|kind| {
            let deps: BTreeSet<EntityKind> =
                edges(*kind).into_iter().filter(|t| kinds.contains(t)).collect();
            (*kind, deps)
        })
        .collect();

    let mut order = Vec::with_capacity(kinds.len());
    while !pending.is_empty() {
        let next = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(kind, _)| *kind)
            .min_by_key(|kind| priority(*kind));

        let Some(kind) = next else {
            let mut members: Vec<EntityKind> = pending.keys().copied().collect();
            members.sort_by_key(|k| schema::declaration_index(*k));
            return Err(OrderError::CyclicDependency { members });
        };

        pending.remove(&kind);
        for deps in pending.values_mut() {
            deps.remove(&kind);
        }
        order.push(kind);
    }
    Ok(order)
}
