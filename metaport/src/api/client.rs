//! Remote metadata catalog client
//!
//! [`CatalogApi`] is the capability surface the pipelines consume: token-paged
//! listing, lookup by fully-qualified name, create, and update. The pipelines
//! only ever talk to the trait, so tests run against an in-memory fake and
//! production runs against [`CatalogClient`], a reqwest implementation with
//! bearer-token auth.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::models::{EntityPage, EntityRecord};
use crate::migrate::schema::EntityKind;

/// Capability surface of one catalog instance.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// One page of records of a kind. `page_token` is the opaque cursor from
    /// the previous page; listing is cursor-based so it stays resumable under
    /// concurrent remote mutation.
    async fn list_by_kind(
        &self,
        kind: EntityKind,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<EntityPage, ApiError>;

    /// Look a record up by fully-qualified name. Absence is `Ok(None)`, not
    /// an error.
    async fn get_by_name(
        &self,
        kind: EntityKind,
        fqn: &str,
    ) -> Result<Option<EntityRecord>, ApiError>;

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<EntityRecord, ApiError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: Uuid,
        payload: Value,
    ) -> Result<EntityRecord, ApiError>;

    /// Endpoint identity recorded in the manifest.
    fn endpoint(&self) -> &str;
}

/// HTTP client for a catalog instance.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, kind: EntityKind, suffix: &str) -> String {
        format!("{}/api/v1/{}{}", self.base_url, kind.route(), suffix)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and parse the JSON body, classifying failures.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), truncate(&body)));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Terminal { status: None, message: e.to_string() })
    }
}

fn record_from(value: Value) -> Result<EntityRecord, ApiError> {
    EntityRecord::from_payload(value)
        .map_err(|e| ApiError::Terminal { status: None, message: e.to_string() })
}

/// Keep error bodies readable in logs and the manifest.
fn truncate(body: &str) -> String {
    const LIMIT: usize = 500;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let mut out: String = body.chars().take(LIMIT).collect();
        out.push('…');
        out
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn list_by_kind(
        &self,
        kind: EntityKind,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<EntityPage, ApiError> {
        let mut builder = self
            .http
            .get(self.url(kind, ""))
            .query(&[("limit", page_size.to_string())])
            .query(&[("include", "all")]);
        if let Some(token) = page_token {
            builder = builder.query(&[("after", token)]);
        }
        let body = self.send(builder).await?;

        let records = body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(record_from)
            .collect::<Result<Vec<_>, _>>()?;
        let next_page_token = body
            .pointer("/paging/after")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(EntityPage { records, next_page_token })
    }

    async fn get_by_name(
        &self,
        kind: EntityKind,
        fqn: &str,
    ) -> Result<Option<EntityRecord>, ApiError> {
        let url = self.url(kind, &format!("/name/{}", urlencoding::encode(fqn)));
        let response = self
            .request(self.http.get(url).query(&[("include", "all")]))
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), truncate(&body)));
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Terminal { status: None, message: e.to_string() })?;
        record_from(body).map(Some)
    }

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<EntityRecord, ApiError> {
        let body = self.send(self.http.post(self.url(kind, "")).json(&payload)).await?;
        record_from(body)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: Uuid,
        payload: Value,
    ) -> Result<EntityRecord, ApiError> {
        let url = self.url(kind, &format!("/{id}"));
        let body = self.send(self.http.put(url).json(&payload)).await?;
        record_from(body)
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = CatalogClient::new("http://catalog:8585/", None);
        assert_eq!(client.endpoint(), "http://catalog:8585");
        assert_eq!(
            client.url(EntityKind::DataProduct, ""),
            "http://catalog:8585/api/v1/dataProducts"
        );
        assert_eq!(
            client.url(EntityKind::DatabaseService, "/name/mysql"),
            "http://catalog:8585/api/v1/services/databaseServices/name/mysql"
        );
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(2000);
        let truncated = truncate(&body);
        assert!(truncated.len() < 520);
        assert!(truncated.ends_with('…'));
    }
}
