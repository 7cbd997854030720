//! Table-level access to the data store.
//!
//! The CRM talks to its store the way a hosted PostgREST-style service is
//! used: select / insert / update / delete against named tables, with simple
//! equality filters, ordering, limits and embedded to-one relations. Two
//! implementations exist: [`rest::RestBackend`] for the hosted service and
//! [`sqlite::SqliteBackend`] for a local database file.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{AppConfig, BackendKind};
use crate::error::{Error, Result};

pub mod rest;
pub mod sqlite;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn neq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Neq(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Neq(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Order { column: column.to_string(), ascending: true }
    }

    pub fn desc(column: &str) -> Self {
        Order { column: column.to_string(), ascending: false }
    }
}

/// A to-one relation resolved inline: `foreign_key` on the selected row
/// references `id` on `table`. The related row is placed under the key
/// `table`, reduced to `columns` (all columns when empty).
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub table: String,
    pub foreign_key: String,
    pub columns: Vec<String>,
    pub nested: Vec<Embed>,
}

impl Embed {
    pub fn new(table: &str, foreign_key: &str) -> Self {
        Embed {
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            columns: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn nest(mut self, embed: Embed) -> Self {
        self.nested.push(embed);
        self
    }

    /// PostgREST select fragment, e.g. `crm_invoices(invoice_number,customers(name))`.
    pub fn select_fragment(&self) -> String {
        let mut parts: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.clone()
        };
        parts.extend(self.nested.iter().map(Embed::select_fragment));
        format!("{}({})", self.table, parts.join(","))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub embeds: Vec<Embed>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::neq(column, value))
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// PostgREST `select` parameter.
    pub fn select_param(&self) -> String {
        let mut parts = vec!["*".to_string()];
        parts.extend(self.embeds.iter().map(Embed::select_fragment));
        parts.join(",")
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>>;

    /// Number of rows in `table`.
    async fn count(&self, table: &str) -> Result<u64>;

    /// Inserts all rows as one request and returns them as stored (with `id`
    /// and `created_at` filled in). A unique-key violation is
    /// [`Error::Conflict`].
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>>;

    /// Merges `patch` into every row matching all `filters` and returns the
    /// updated rows; an empty result means nothing matched.
    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>>;

    /// Deletes every row matching all `filters`, returning how many went.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64>;
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Validation(format!("expected an object, got {other}"))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

/// Opens the backend selected by `config`.
pub fn connect(config: &AppConfig) -> Result<Arc<dyn Backend>> {
    match config.backend {
        BackendKind::Rest => {
            let url = config
                .backend_url
                .as_deref()
                .ok_or_else(|| Error::Config("CRM_BACKEND_URL is not set".to_string()))?;
            let key = config
                .backend_key
                .as_deref()
                .ok_or_else(|| Error::Config("CRM_BACKEND_KEY is not set".to_string()))?;
            Ok(Arc::new(rest::RestBackend::new(url, key)?))
        }
        BackendKind::Sqlite => Ok(Arc::new(sqlite::SqliteBackend::open(&config.database_path)?)),
    }
}
