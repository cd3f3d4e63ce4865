//! REST client for the hosted catalog backend.
//!
//! The backend exposes PostgREST-style endpoints under `/rest/v1/{table}`.
//! Filters are query parameters (`category=eq.beach`), ordering is a single
//! `order` parameter, and totals come back in the `Content-Range` header
//! when `Prefer: count=exact` is sent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{instrument, warn};

use sugbo_core::{CatalogEntry, EntityKind};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

use super::convert::entry_from_row;
use super::{CatalogBackend, CatalogPatch, ListQuery, Page};

const CANONICAL_ORDER: &str = "featured.desc,created_at.desc,id.asc";

/// HTTP client for the hosted catalog. Cheap to clone.
#[derive(Clone)]
pub struct RestCatalogClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    timeout: Duration,
}

impl RestCatalogClient {
    /// Build a client from the sync configuration.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the underlying HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.backend_url.trim_end_matches('/').to_owned(),
                anon_key: config.anon_key.clone(),
                timeout: config.http_timeout,
            }),
        })
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.inner.base_url, kind.table())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .timeout(self.inner.timeout)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(self.inner.anon_key.expose_secret())
    }
}

#[async_trait]
impl CatalogBackend for RestCatalogClient {
    #[instrument(skip(self, query), fields(kind = %kind))]
    async fn list_active(&self, kind: EntityKind, query: &ListQuery) -> Result<Page<CatalogEntry>> {
        let response = self
            .request(reqwest::Method::GET, &self.table_url(kind))
            .query(&list_params(query))
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check_status(response)?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_total);

        let rows: Vec<Value> = response.json().await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            match entry_from_row(kind, row) {
                Ok(entry) => items.push(entry),
                Err(err) => warn!(kind = %kind, error = %err, "dropping malformed catalog row"),
            }
        }
        let total = total.unwrap_or(items.len() as u64);
        Ok(Page { items, total })
    }

    #[instrument(skip(self), fields(kind = %kind, id = %id))]
    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<CatalogEntry> {
        let id_filter = format!("eq.{id}");
        let response = self
            .request(reqwest::Method::GET, &self.table_url(kind))
            .query(&[("select", "*"), ("id", id_filter.as_str()), ("limit", "1")])
            .send()
            .await?;
        let response = check_status(response)?;

        let rows: Vec<Value> = response.json().await?;
        let row = rows
            .first()
            .ok_or_else(|| SyncError::NotFound(format!("{kind} {id}")))?;
        entry_from_row(kind, row)
    }

    #[instrument(skip(self, entry))]
    async fn create(&self, entry: CatalogEntry) -> Result<CatalogEntry> {
        let kind = entry.kind();
        let body = row_body(&entry)?;
        let response = self
            .request(reqwest::Method::POST, &self.table_url(kind))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response)?;

        let rows: Vec<Value> = response.json().await?;
        let row = rows
            .first()
            .ok_or_else(|| SyncError::Internal("create returned no row".to_owned()))?;
        entry_from_row(kind, row)
    }

    #[instrument(skip(self, patch), fields(kind = %kind, id = %id))]
    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &CatalogPatch,
    ) -> Result<CatalogEntry> {
        let id_filter = format!("eq.{id}");
        let response = self
            .request(reqwest::Method::PATCH, &self.table_url(kind))
            .query(&[("id", id_filter.as_str())])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        let response = check_status(response)?;

        let rows: Vec<Value> = response.json().await?;
        let row = rows
            .first()
            .ok_or_else(|| SyncError::NotFound(format!("{kind} {id}")))?;
        entry_from_row(kind, row)
    }
}

/// Assemble the query string for a list call.
fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("select".to_owned(), "*".to_owned()),
        ("is_active".to_owned(), "eq.true".to_owned()),
        ("order".to_owned(), CANONICAL_ORDER.to_owned()),
    ];
    if let Some(category) = &query.category {
        params.push(("category".to_owned(), format!("eq.{category}")));
    }
    if let Some(featured) = query.featured {
        params.push(("featured".to_owned(), format!("eq.{featured}")));
    }
    if let Some(term) = &query.search {
        let term = escape_search_term(term);
        params.push((
            "or".to_owned(),
            format!("(name.ilike.*{term}*,description.ilike.*{term}*,location.ilike.*{term}*)"),
        ));
    }
    if let Some(after) = query.created_after {
        params.push(("created_at".to_owned(), format!("gte.{}", after.to_rfc3339())));
    }
    if let Some(before) = query.created_before {
        params.push(("created_at".to_owned(), format!("lte.{}", before.to_rfc3339())));
    }
    if let Some(flag) = query.dietary
        && let Ok(Value::String(name)) = serde_json::to_value(flag)
    {
        params.push(("dietary_flags".to_owned(), format!("cs.{{{name}}}")));
    }
    if query.offset > 0 {
        params.push(("offset".to_owned(), query.offset.to_string()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_owned(), limit.to_string()));
    }
    params
}

/// Strip characters with reserved meaning in a PostgREST filter value.
fn escape_search_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%'))
        .collect()
}

/// Total match count from a `Content-Range` header, e.g. `0-9/42`.
fn parse_total(content_range: &str) -> Option<u64> {
    content_range.rsplit('/').next()?.parse().ok()
}

/// Serialize an entry as a flat table row (no kind tag).
fn row_body(entry: &CatalogEntry) -> Result<Value> {
    let value = match entry {
        CatalogEntry::Destination(d) => serde_json::to_value(d)?,
        CatalogEntry::Delicacy(d) => serde_json::to_value(d)?,
    };
    Ok(value)
}

/// Map backend status codes onto the shared error taxonomy.
fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = format!("backend returned {status}");
    Err(match status.as_u16() {
        401 => SyncError::Unauthorized(detail),
        403 => SyncError::PermissionDenied(detail),
        404 | 406 => SyncError::NotFound(detail),
        409 => SyncError::Conflict(detail),
        _ => SyncError::FetchFailed(detail),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sugbo_core::DietaryFlag;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_default_query_params() {
        let params = list_params(&ListQuery::default());
        assert_eq!(param(&params, "is_active"), vec!["eq.true"]);
        assert_eq!(param(&params, "order"), vec![CANONICAL_ORDER]);
        assert!(param(&params, "offset").is_empty());
        assert!(param(&params, "limit").is_empty());
    }

    #[test]
    fn test_filters_map_to_postgrest_operators() {
        let query = ListQuery::default()
            .with_category("beach")
            .with_featured(true)
            .with_search("kawasan")
            .with_dietary(DietaryFlag::Vegan)
            .with_page(20, 10);
        let params = list_params(&query);

        assert_eq!(param(&params, "category"), vec!["eq.beach"]);
        assert_eq!(param(&params, "featured"), vec!["eq.true"]);
        assert_eq!(
            param(&params, "or"),
            vec!["(name.ilike.*kawasan*,description.ilike.*kawasan*,location.ilike.*kawasan*)"]
        );
        assert_eq!(param(&params, "dietary_flags"), vec!["cs.{vegan}"]);
        assert_eq!(param(&params, "offset"), vec!["20"]);
        assert_eq!(param(&params, "limit"), vec!["10"]);
    }

    #[test]
    fn test_date_bounds_repeat_the_column_key() {
        let after = Utc.timestamp_opt(1_000, 0).unwrap();
        let before = Utc.timestamp_opt(2_000, 0).unwrap();
        let mut query = ListQuery::default();
        query.created_after = Some(after);
        query.created_before = Some(before);

        let params = list_params(&query);
        let bounds = param(&params, "created_at");
        assert_eq!(bounds.len(), 2);
        assert!(bounds[0].starts_with("gte."));
        assert!(bounds[1].starts_with("lte."));
    }

    #[test]
    fn test_search_term_reserved_characters_stripped() {
        let query = ListQuery::default().with_search("le*ch(on),%");
        let params = list_params(&query);
        assert_eq!(
            param(&params, "or"),
            vec!["(name.ilike.*lechon*,description.ilike.*lechon*,location.ilike.*lechon*)"]
        );
    }

    #[test]
    fn test_parse_total() {
        assert_eq!(parse_total("0-9/42"), Some(42));
        assert_eq!(parse_total("*/0"), Some(0));
        assert_eq!(parse_total("0-9/*"), None);
    }
}
