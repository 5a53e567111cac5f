//! Catalog record models
//!
//! Catalog entities are open documents, so records carry an opaque JSON
//! payload plus a small set of extracted fields (identifier, name,
//! fully-qualified name, references). Records are value objects: immutable
//! once fetched, transformations produce new payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::migrate::schema::{EntityKind, ReferenceField, references_of};

/// Payload fields the catalog service assigns server-side. Stripped when
/// building create/update requests so replayed records upsert cleanly.
const SERVER_ASSIGNED_FIELDS: &[&str] = &[
    "id",
    "href",
    "version",
    "updatedAt",
    "updatedBy",
    "changeDescription",
    "incrementalChangeDescription",
    "deleted",
];

/// One instance of an entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    payload: Value,
}

/// Error extracting required fields from a payload.
#[derive(Debug, Clone)]
pub enum RecordError {
    /// Payload is not a JSON object
    NotAnObject,
    /// Payload has no usable "name" field
    MissingName,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::NotAnObject => write!(f, "record payload is not a JSON object"),
            RecordError::MissingName => write!(f, "record payload has no 'name' field"),
        }
    }
}

impl std::error::Error for RecordError {}

impl EntityRecord {
    /// Wrap a raw payload, validating the fields every record must carry.
    pub fn from_payload(payload: Value) -> Result<Self, RecordError> {
        let obj = payload.as_object().ok_or(RecordError::NotAnObject)?;
        match obj.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => Ok(Self { payload }),
            _ => Err(RecordError::MissingName),
        }
    }

    /// Stable identifier, when the payload carries one (exported records do;
    /// hand-written seed files may not).
    pub fn id(&self) -> Option<Uuid> {
        self.payload
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn name(&self) -> &str {
        // Validated non-empty in from_payload.
        self.payload.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Fully-qualified name: the human-readable secondary key used for
    /// idempotent upserts. Falls back to the plain name for root entities.
    pub fn fqn(&self) -> &str {
        self.payload
            .get("fullyQualifiedName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.name())
    }

    /// Soft-delete marker.
    pub fn is_deleted(&self) -> bool {
        self.payload.get("deleted").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Platform-internal records (seeded by the catalog service itself).
    pub fn is_system(&self) -> bool {
        self.payload.get("provider").and_then(Value::as_str) == Some("system")
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Names of the records referenced through one declared reference field.
    ///
    /// Reference values appear either as reference objects (with
    /// `fullyQualifiedName`/`name`), as bare name strings, or as arrays of
    /// those for `many` fields.
    pub fn reference_names(&self, reference: &ReferenceField) -> Vec<String> {
        let Some(value) = self.payload.get(reference.field) else {
            return Vec::new();
        };
        match value {
            Value::Array(items) if reference.many => {
                items.iter().filter_map(reference_name).collect()
            }
            _ => reference_name(value).into_iter().collect(),
        }
    }

    /// All reference names on this record, grouped by target kind.
    pub fn references(&self, kind: EntityKind) -> Vec<(EntityKind, String)> {
        references_of(kind)
            .iter()
            .flat_map(|r| {
                self.reference_names(r).into_iter().map(|name| (r.target, name))
            })
            .collect()
    }

    /// Build the write payload for an upsert: server-assigned fields removed
    /// and reference objects flattened to fully-qualified name strings, which
    /// is what the create/update endpoints accept.
    pub fn write_payload(&self, kind: EntityKind) -> Value {
        let Some(obj) = self.payload.as_object() else {
            return self.payload.clone();
        };
        let mut out = serde_json::Map::new();
        for (key, value) in obj {
            if SERVER_ASSIGNED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let reference = references_of(kind).iter().find(|r| r.field == key.as_str());
            match reference {
                Some(r) if r.many => {
                    let names: Vec<Value> = match value {
                        Value::Array(items) => items
                            .iter()
                            .filter_map(reference_name)
                            .map(Value::String)
                            .collect(),
                        other => reference_name(other).map(Value::String).into_iter().collect(),
                    };
                    out.insert(key.clone(), Value::Array(names));
                }
                Some(_) => {
                    if let Some(name) = reference_name(value) {
                        out.insert(key.clone(), Value::String(name));
                    }
                }
                None => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Object(out)
    }
}

/// Extract a referenced record's name from a reference value.
fn reference_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => obj
            .get("fullyQualifiedName")
            .or_else(|| obj.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// One page of a token-paged listing.
#[derive(Debug, Clone, Default)]
pub struct EntityPage {
    pub records: Vec<EntityRecord>,
    /// Opaque cursor for the next page; `None` when exhausted.
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload_requires_name() {
        assert!(matches!(
            EntityRecord::from_payload(json!([1, 2])),
            Err(RecordError::NotAnObject)
        ));
        assert!(matches!(
            EntityRecord::from_payload(json!({"id": "x"})),
            Err(RecordError::MissingName)
        ));
        assert!(EntityRecord::from_payload(json!({"name": "Finance"})).is_ok());
    }

    #[test]
    fn test_fqn_falls_back_to_name() {
        let record = EntityRecord::from_payload(json!({"name": "Finance"})).unwrap();
        assert_eq!(record.fqn(), "Finance");

        let record = EntityRecord::from_payload(
            json!({"name": "orders", "fullyQualifiedName": "svc.db.schema.orders"}),
        )
        .unwrap();
        assert_eq!(record.fqn(), "svc.db.schema.orders");
    }

    #[test]
    fn test_reference_names_object_and_string() {
        let product = EntityRecord::from_payload(json!({
            "name": "P1",
            "domain": {"name": "Finance", "fullyQualifiedName": "Finance", "type": "domain"},
        }))
        .unwrap();
        let refs = product.references(EntityKind::DataProduct);
        assert_eq!(refs, vec![(EntityKind::Domain, "Finance".to_string())]);

        let product = EntityRecord::from_payload(json!({"name": "P1", "domain": "Finance"})).unwrap();
        let refs = product.references(EntityKind::DataProduct);
        assert_eq!(refs, vec![(EntityKind::Domain, "Finance".to_string())]);
    }

    #[test]
    fn test_reference_names_many() {
        let table = EntityRecord::from_payload(json!({
            "name": "orders",
            "databaseSchema": {"fullyQualifiedName": "svc.db.sales"},
            "dataProducts": [
                {"fullyQualifiedName": "P1"},
                {"fullyQualifiedName": "P2"},
            ],
        }))
        .unwrap();
        let refs = table.references(EntityKind::Table);
        assert!(refs.contains(&(EntityKind::DatabaseSchema, "svc.db.sales".to_string())));
        assert!(refs.contains(&(EntityKind::DataProduct, "P1".to_string())));
        assert!(refs.contains(&(EntityKind::DataProduct, "P2".to_string())));
    }

    #[test]
    fn test_write_payload_strips_server_fields_and_flattens_refs() {
        let record = EntityRecord::from_payload(json!({
            "id": "5f4dcc3b-1111-2222-3333-444455556666",
            "name": "P1",
            "href": "http://source/api/v1/dataProducts/x",
            "version": 0.2,
            "updatedAt": 1700000000,
            "deleted": false,
            "description": "payments",
            "domain": {"name": "Finance", "fullyQualifiedName": "Finance"},
        }))
        .unwrap();

        let payload = record.write_payload(EntityKind::DataProduct);
        let obj = payload.as_object().unwrap();
        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("href"));
        assert!(!obj.contains_key("version"));
        assert_eq!(obj["name"], "P1");
        assert_eq!(obj["description"], "payments");
        assert_eq!(obj["domain"], "Finance");
    }

    #[test]
    fn test_deleted_and_system_markers() {
        let record = EntityRecord::from_payload(
            json!({"name": "old", "deleted": true, "provider": "system"}),
        )
        .unwrap();
        assert!(record.is_deleted());
        assert!(record.is_system());

        let record = EntityRecord::from_payload(json!({"name": "live"})).unwrap();
        assert!(!record.is_deleted());
        assert!(!record.is_system());
    }
}
