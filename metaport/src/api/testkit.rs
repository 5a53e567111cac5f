//! In-memory catalog fake for pipeline tests

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::api::client::CatalogApi;
use crate::api::error::ApiError;
use crate::api::models::{EntityPage, EntityRecord};
use crate::migrate::schema::EntityKind;

/// Fake catalog instance backed by in-memory records.
///
/// Supports failure injection by record name: terminal failures return the
/// configured status on every write, transient failures return 503 a fixed
/// number of times before succeeding.
pub struct FakeCatalog {
    endpoint: String,
    records: Mutex<BTreeMap<EntityKind, Vec<EntityRecord>>>,
    terminal_failures: Mutex<BTreeMap<String, u16>>,
    transient_failures: Mutex<BTreeMap<String, u32>>,
    pub create_calls: AtomicU64,
    pub update_calls: AtomicU64,
}

impl FakeCatalog {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            records: Mutex::new(BTreeMap::new()),
            terminal_failures: Mutex::new(BTreeMap::new()),
            transient_failures: Mutex::new(BTreeMap::new()),
            create_calls: AtomicU64::new(0),
            update_calls: AtomicU64::new(0),
        }
    }

    /// Seed a record from a raw payload, assigning an id when absent.
    pub fn seed(&self, kind: EntityKind, mut payload: Value) -> EntityRecord {
        if payload.get("id").is_none() {
            payload["id"] = json!(Uuid::new_v4().to_string());
        }
        let record = EntityRecord::from_payload(payload).expect("seed payload must be valid");
        self.records.lock().unwrap().entry(kind).or_default().push(record.clone());
        record
    }

    /// Every write touching a record with this name fails terminally.
    pub fn fail_terminal(&self, name: &str, status: u16) {
        self.terminal_failures.lock().unwrap().insert(name.to_string(), status);
    }

    /// The next `times` writes touching a record with this name fail with 503.
    pub fn fail_transient(&self, name: &str, times: u32) {
        self.transient_failures.lock().unwrap().insert(name.to_string(), times);
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.records.lock().unwrap().get(&kind).map_or(0, Vec::len)
    }

    pub fn find_by_name(&self, kind: EntityKind, fqn: &str) -> Option<EntityRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&kind)?
            .iter()
            .find(|r| r.fqn() == fqn || r.name() == fqn)
            .cloned()
    }

    fn check_failures(&self, name: &str) -> Result<(), ApiError> {
        if let Some(status) = self.terminal_failures.lock().unwrap().get(name) {
            return Err(ApiError::from_status(*status, format!("injected failure for '{name}'")));
        }
        let mut transient = self.transient_failures.lock().unwrap();
        if let Some(remaining) = transient.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::from_status(503, format!("injected transient for '{name}'")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_by_kind(
        &self,
        kind: EntityKind,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<EntityPage, ApiError> {
        let records = self.records.lock().unwrap();
        let all = records.get(&kind).cloned().unwrap_or_default();
        let start: usize = page_token.map(|t| t.parse().unwrap_or(0)).unwrap_or(0);
        let page: Vec<_> = all.iter().skip(start).take(page_size).cloned().collect();
        let next = start + page.len();
        let next_page_token = (next < all.len()).then(|| next.to_string());
        Ok(EntityPage { records: page, next_page_token })
    }

    async fn get_by_name(
        &self,
        kind: EntityKind,
        fqn: &str,
    ) -> Result<Option<EntityRecord>, ApiError> {
        Ok(self.find_by_name(kind, fqn))
    }

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<EntityRecord, ApiError> {
        let name = payload.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        self.check_failures(&name)?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.find_by_name(kind, &name).is_some() {
            return Err(ApiError::from_status(409, format!("'{name}' already exists")));
        }

        let mut stored = payload;
        stored["id"] = json!(Uuid::new_v4().to_string());
        let record = EntityRecord::from_payload(stored)
            .map_err(|e| ApiError::from_status(400, e.to_string()))?;
        self.records.lock().unwrap().entry(kind).or_default().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: Uuid,
        payload: Value,
    ) -> Result<EntityRecord, ApiError> {
        let name = payload.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        self.check_failures(&name)?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let mut records = self.records.lock().unwrap();
        let list = records
            .get_mut(&kind)
            .ok_or_else(|| ApiError::from_status(404, format!("no records of kind {kind}")))?;
        let slot = list
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| ApiError::from_status(404, format!("no record with id {id}")))?;

        let mut stored = payload;
        stored["id"] = json!(id.to_string());
        let record = EntityRecord::from_payload(stored)
            .map_err(|e| ApiError::from_status(400, e.to_string()))?;
        *slot = record.clone();
        Ok(record)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
