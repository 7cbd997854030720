//! Hosted backend speaking the PostgREST dialect at `<url>/rest/v1/<table>`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::error;

use super::{Backend, Filter, Query, Row};
use crate::error::{Error, Result};

pub struct RestBackend {
    client: Client,
    base_url: String,
    key: String,
}

fn value_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `(column, "eq.v")` pairs; a null value becomes an `is.null` test.
pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let op = match f {
                Filter::Eq(_, Value::Null) => "is.null".to_string(),
                Filter::Neq(_, Value::Null) => "not.is.null".to_string(),
                Filter::Eq(_, v) => format!("eq.{}", value_param(v)),
                Filter::Neq(_, v) => format!("neq.{}", value_param(v)),
            };
            (f.column().to_string(), op)
        })
        .collect()
}

pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.select_param())];
    params.extend(filter_params(&query.filters));
    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_string(), order));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`.
pub(crate) fn content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// PostgREST error bodies carry a `message`; anything else is passed through.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl RestBackend {
    pub fn new(base_url: &str, key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    pub(crate) fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn send(&self, op: &'static str, table: &str, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await.map_err(|e| {
            error!(op, table, error = %e, "backend request failed");
            Error::Http(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        error!(op, table, status = status.as_u16(), message = %message, "backend rejected request");
        if status == StatusCode::CONFLICT {
            Err(Error::Conflict(message))
        } else {
            Err(Error::Backend { status: status.as_u16(), message })
        }
    }

    async fn rows(response: Response) -> Result<Vec<Row>> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        let req = self.request(Method::GET, table).query(&query_params(query));
        let response = self.send("select", table, req).await?;
        Self::rows(response).await
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let req = self
            .request(Method::GET, table)
            .header("Prefer", "count=exact")
            .query(&[("select", "id"), ("limit", "1")]);
        let response = self.send("count", table, req).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| Error::Backend {
                status: response.status().as_u16(),
                message: "missing Content-Range total".to_string(),
            })
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let req = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self.send("insert", table, req).await?;
        Self::rows(response).await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>> {
        if filters.is_empty() {
            return Err(Error::Validation("update requires at least one filter".to_string()));
        }
        let req = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .json(&patch);
        let response = self.send("update", table, req).await?;
        Self::rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        if filters.is_empty() {
            return Err(Error::Validation("delete requires at least one filter".to_string()));
        }
        let req = self
            .request(Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(&filter_params(filters));
        let response = self.send("delete", table, req).await?;
        Ok(Self::rows(response).await?.len() as u64)
    }
}
