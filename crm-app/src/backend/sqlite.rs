//! Local backend: one SQLite table per resource, each row stored as a JSON
//! document next to its `id` and `created_at`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use super::{Backend, Embed, Filter, Query, Row};
use crate::error::{classify_sqlite, Error, Result};
use crate::format::now_iso;
use crate::model::TABLES;

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    write_lock: Arc<Mutex<()>>,
}

fn configure_sqlite(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    // Apply PRAGMAs on init (outside any transaction).
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA foreign_keys = ON;\n\
         PRAGMA temp_store = MEMORY;\n\
         PRAGMA busy_timeout = 5000;\n",
    )?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn init_schema(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    for table in TABLES {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY NOT NULL,
                created_at TEXT NOT NULL,
                data_json TEXT NOT NULL
            );"
        ))?;
    }

    conn.execute_batch(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS estimates_number_key
            ON estimates (json_extract(data_json, '$.estimate_number'));
        CREATE UNIQUE INDEX IF NOT EXISTS crm_invoices_number_key
            ON crm_invoices (json_extract(data_json, '$.invoice_number'));
        CREATE INDEX IF NOT EXISTS estimate_line_items_parent
            ON estimate_line_items (json_extract(data_json, '$.estimate_id'));
        CREATE INDEX IF NOT EXISTS crm_invoice_line_items_parent
            ON crm_invoice_line_items (json_extract(data_json, '$.invoice_id'));
        CREATE INDEX IF NOT EXISTS payments_invoice
            ON payments (json_extract(data_json, '$.invoice_id'));
        "#,
    )?;
    Ok(())
}

fn check_table(table: &str) -> Result<&str> {
    if TABLES.contains(&table) {
        Ok(table)
    } else {
        Err(Error::Validation(format!("unknown table '{table}'")))
    }
}

fn column_expr(column: &str) -> Result<String> {
    let valid = !column.is_empty() && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::Validation(format!("invalid column name '{column}'")));
    }
    Ok(match column {
        "id" | "created_at" => column.to_string(),
        _ => format!("json_extract(data_json, '$.{column}')"),
    })
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn where_clause(filters: &[Filter]) -> Result<(String, Vec<SqlValue>)> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut parts = Vec::with_capacity(filters.len());
    let mut values = Vec::new();
    for filter in filters {
        let expr = column_expr(filter.column())?;
        match filter {
            Filter::Eq(_, Value::Null) => parts.push(format!("{expr} IS NULL")),
            Filter::Neq(_, Value::Null) => parts.push(format!("{expr} IS NOT NULL")),
            Filter::Eq(_, v) => {
                values.push(sql_value(v));
                parts.push(format!("{expr} = ?{}", values.len()));
            }
            Filter::Neq(_, v) => {
                values.push(sql_value(v));
                parts.push(format!("{expr} != ?{}", values.len()));
            }
        }
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), values))
}

/// Builds the SELECT for `query`. Ties in the requested order fall back to
/// insertion order in the same direction.
fn select_sql(table: &str, query: &Query) -> Result<(String, Vec<SqlValue>)> {
    let table = check_table(table)?;
    let (where_sql, values) = where_clause(&query.filters)?;
    let mut sql = format!("SELECT data_json FROM {table}{where_sql}");

    let mut order_parts = Vec::with_capacity(query.order.len() + 1);
    for order in &query.order {
        let dir = if order.ascending { "ASC" } else { "DESC" };
        order_parts.push(format!("{} {dir}", column_expr(&order.column)?));
    }
    let tie_dir = match query.order.first() {
        Some(o) if !o.ascending => "DESC",
        _ => "ASC",
    };
    order_parts.push(format!("rowid {tie_dir}"));
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_parts.join(", "));

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok((sql, values))
}

fn parse_row(json: &str) -> Result<Row> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Validation("stored row is not a JSON object".to_string())),
    }
}

fn load_by_id(conn: &Connection, table: &str, id: &str) -> Result<Option<Row>> {
    let table = check_table(table)?;
    let json: Option<String> = conn
        .query_row(
            &format!("SELECT data_json FROM {table} WHERE id = ?1"),
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    json.as_deref().map(parse_row).transpose()
}

fn resolve_embeds(conn: &Connection, row: &mut Row, embeds: &[Embed]) -> Result<()> {
    for embed in embeds {
        let related = match row.get(&embed.foreign_key).and_then(Value::as_str) {
            Some(id) => load_by_id(conn, &embed.table, id)?,
            None => None,
        };
        let value = match related {
            Some(mut related) => {
                resolve_embeds(conn, &mut related, &embed.nested)?;
                if !embed.columns.is_empty() {
                    let keep: Vec<&str> = embed
                        .columns
                        .iter()
                        .map(String::as_str)
                        .chain(embed.nested.iter().map(|n| n.table.as_str()))
                        .collect();
                    related.retain(|k, _| keep.contains(&k.as_str()));
                }
                Value::Object(related)
            }
            None => Value::Null,
        };
        row.insert(embed.table.clone(), value);
    }
    Ok(())
}

fn select_rows(conn: &Connection, table: &str, query: &Query) -> Result<Vec<Row>> {
    let (sql, values) = select_sql(table, query)?;
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let json: String = r.get(0)?;
        let mut row = parse_row(&json)?;
        resolve_embeds(conn, &mut row, &query.embeds)?;
        out.push(row);
    }
    Ok(out)
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure_sqlite(&conn)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn with_read<T, F>(&self, op_name: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Task("db mutex poisoned".to_string()))?;
            f(&guard).map_err(|e| {
                error!(op = op_name, error = %e, "sqlite read failed");
                e
            })
        })
        .await?
    }

    async fn with_write<T, F>(&self, op_name: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let write_lock = self.write_lock.clone();
        tokio::task::spawn_blocking(move || {
            let _wg = write_lock
                .lock()
                .map_err(|_| Error::Task("write mutex poisoned".to_string()))?;
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Task("db mutex poisoned".to_string()))?;
            f(&mut guard).map_err(|e| {
                error!(op = op_name, error = %e, "sqlite write failed");
                e
            })
        })
        .await?
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        let table = table.to_string();
        let query = query.clone();
        self.with_read("select", move |conn| select_rows(conn, &table, &query))
            .await
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let table = check_table(table)?.to_string();
        self.with_read("count", move |conn| {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
        .await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let table = check_table(table)?.to_string();
        self.with_write("insert", move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut stored = Vec::with_capacity(rows.len());
            for mut row in rows {
                let id = match row.get("id").and_then(Value::as_str) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => Uuid::new_v4().to_string(),
                };
                let created_at = match row.get("created_at").and_then(Value::as_str) {
                    Some(ts) if !ts.is_empty() => ts.to_string(),
                    _ => now_iso(),
                };
                row.insert("id".to_string(), Value::String(id.clone()));
                row.insert("created_at".to_string(), Value::String(created_at.clone()));
                let json = serde_json::to_string(&row)?;
                tx.execute(
                    &format!("INSERT INTO {table} (id, created_at, data_json) VALUES (?1, ?2, ?3)"),
                    params![id, created_at, json],
                )
                .map_err(classify_sqlite)?;
                stored.push(row);
            }
            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>> {
        let table = check_table(table)?.to_string();
        if filters.is_empty() {
            return Err(Error::Validation("update requires at least one filter".to_string()));
        }
        let filters = filters.to_vec();
        self.with_write("update", move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let matched = select_rows(&tx, &table, &Query { filters, ..Query::default() })?;
            let mut updated = Vec::with_capacity(matched.len());
            for mut row in matched {
                let Some(id) = row.get("id").and_then(Value::as_str).map(str::to_string) else {
                    continue;
                };
                for (k, v) in &patch {
                    if k != "id" {
                        row.insert(k.clone(), v.clone());
                    }
                }
                let created_at = row
                    .get("created_at")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let json = serde_json::to_string(&row)?;
                tx.execute(
                    &format!("UPDATE {table} SET created_at = ?2, data_json = ?3 WHERE id = ?1"),
                    params![id, created_at, json],
                )
                .map_err(classify_sqlite)?;
                updated.push(row);
            }
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let table = check_table(table)?.to_string();
        if filters.is_empty() {
            return Err(Error::Validation("delete requires at least one filter".to_string()));
        }
        let (where_sql, values) = where_clause(filters)?;
        self.with_write("delete", move |conn| {
            let n = conn
                .execute(&format!("DELETE FROM {table}{where_sql}"), params_from_iter(values.iter()))
                .map_err(classify_sqlite)?;
            Ok(n as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{to_row, Order};
    use serde_json::json;

    fn row(v: Value) -> Row {
        to_row(&v).unwrap()
    }

    #[test]
    fn select_sql_filters_orders_and_limits() {
        let q = Query::new()
            .eq("invoice_id", "i1")
            .neq("status", "paid")
            .order(Order::desc("created_at"))
            .limit(1);
        let (sql, values) = select_sql("payments", &q).unwrap();
        assert_eq!(
            sql,
            "SELECT data_json FROM payments WHERE json_extract(data_json, '$.invoice_id') = ?1 \
             AND json_extract(data_json, '$.status') != ?2 ORDER BY created_at DESC, rowid DESC LIMIT 1"
        );
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn unknown_tables_and_bad_columns_are_rejected() {
        assert!(select_sql("invoices; DROP TABLE x", &Query::new()).is_err());
        assert!(select_sql("payments", &Query::new().eq("a'b", 1)).is_err());
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamp() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let stored = db
            .insert("customers", vec![row(json!({ "name": "Ada" }))])
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].get("id").and_then(Value::as_str).is_some());
        assert!(stored[0].get("created_at").and_then(Value::as_str).is_some());
        assert_eq!(db.count("customers").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_document_numbers_conflict() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.insert("estimates", vec![row(json!({ "estimate_number": "EST-0001" }))])
            .await
            .unwrap();
        let err = db
            .insert("estimates", vec![row(json!({ "estimate_number": "EST-0001" }))])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(db.count("estimates").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bulk_insert_is_all_or_nothing() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let err = db
            .insert(
                "crm_invoices",
                vec![
                    row(json!({ "id": "a", "invoice_number": "INV-0001" })),
                    row(json!({ "id": "a", "invoice_number": "INV-0002" })),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(db.count("crm_invoices").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_is_conditional_on_filters() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.insert(
            "crm_invoices",
            vec![row(json!({ "id": "i1", "invoice_number": "INV-0001", "amount_paid": 0 }))],
        )
        .await
        .unwrap();

        let stale = db
            .update(
                "crm_invoices",
                &[Filter::eq("id", "i1"), Filter::eq("amount_paid", 10.0)],
                row(json!({ "amount_paid": 20.0 })),
            )
            .await
            .unwrap();
        assert!(stale.is_empty());

        let fresh = db
            .update(
                "crm_invoices",
                &[Filter::eq("id", "i1"), Filter::eq("amount_paid", 0.0)],
                row(json!({ "amount_paid": 20.0 })),
            )
            .await
            .unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0]["amount_paid"], json!(20.0));
        assert_eq!(fresh[0]["invoice_number"], json!("INV-0001"));
    }

    #[tokio::test]
    async fn select_resolves_nested_embeds() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.insert("customers", vec![row(json!({ "id": "c1", "name": "Ada", "phone": "555" }))])
            .await
            .unwrap();
        db.insert(
            "crm_invoices",
            vec![row(json!({ "id": "i1", "invoice_number": "INV-0001", "customer_id": "c1" }))],
        )
        .await
        .unwrap();
        db.insert("payments", vec![row(json!({ "id": "p1", "invoice_id": "i1", "amount": 5 }))])
            .await
            .unwrap();

        let q = Query::new().embed(
            Embed::new("crm_invoices", "invoice_id")
                .columns(&["invoice_number"])
                .nest(Embed::new("customers", "customer_id").columns(&["name"])),
        );
        let rows = db.select("payments", &q).await.unwrap();
        assert_eq!(
            rows[0]["crm_invoices"],
            json!({ "invoice_number": "INV-0001", "customers": { "name": "Ada" } })
        );
    }

    #[tokio::test]
    async fn delete_counts_rows_and_needs_a_filter() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.insert(
            "payments",
            vec![
                row(json!({ "invoice_id": "i1", "amount": 1 })),
                row(json!({ "invoice_id": "i1", "amount": 2 })),
                row(json!({ "invoice_id": "i2", "amount": 3 })),
            ],
        )
        .await
        .unwrap();
        assert!(db.delete("payments", &[]).await.is_err());
        assert_eq!(db.delete("payments", &[Filter::eq("invoice_id", "i1")]).await.unwrap(), 2);
        assert_eq!(db.count("payments").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn latest_row_wins_ties_on_timestamp() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.insert(
            "estimates",
            vec![
                row(json!({ "estimate_number": "EST-0001", "created_at": "2024-01-01T00:00:00.000000Z" })),
                row(json!({ "estimate_number": "EST-0002", "created_at": "2024-01-01T00:00:00.000000Z" })),
            ],
        )
        .await
        .unwrap();
        let rows = db
            .select("estimates", &Query::new().order(Order::desc("created_at")).limit(1))
            .await
            .unwrap();
        assert_eq!(rows[0]["estimate_number"], json!("EST-0002"));
    }
}
