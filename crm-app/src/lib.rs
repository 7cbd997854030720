//! Customers, estimates, invoices and payments for a small service business.
//!
//! [`Crm`] is the entry point: every operation is an async method on it and
//! goes through a [`backend::Backend`], either the hosted REST service or a
//! local SQLite file.

use std::sync::Arc;

pub mod backend;
pub mod config;
pub mod customers;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod estimates;
pub mod format;
pub mod invoices;
pub mod logging;
pub mod model;
pub mod numbering;
pub mod payments;
pub mod pdf;
pub mod reconcile;

pub use error::{Error, Result};

use backend::Backend;
use config::AppConfig;

#[derive(Clone)]
pub struct Crm {
    backend: Arc<dyn Backend>,
}

impl Crm {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Opens the backend selected by `config`.
    pub fn connect(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(backend::connect(config)?))
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::backend::sqlite::SqliteBackend;
    use crate::backend::{Backend, Filter, Query, Row};
    use crate::document::{DocumentDraft, LineItemInput};
    use crate::error::{Error, Result};
    use crate::estimates::EstimateDocument;
    use crate::invoices::InvoiceDocument;
    use crate::model::{Customer, EstimateStatus, InvoiceStatus, NewCustomer, NewPayment, PaymentMethod};
    use crate::Crm;

    pub async fn memory_crm() -> Crm {
        Crm::new(Arc::new(SqliteBackend::open_in_memory().unwrap()))
    }

    pub async fn customer(crm: &Crm, name: &str) -> Customer {
        crm.create_customer(&NewCustomer {
            name: name.to_string(),
            address: Some("1 Main St".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    pub fn draft(customer_id: &str, items: &[(&str, &str, &str)]) -> DocumentDraft {
        DocumentDraft {
            customer_id: customer_id.to_string(),
            date: "2024-05-01".to_string(),
            due_date: Some("2024-05-31".to_string()),
            work_completed_date: Some("2024-05-01".to_string()),
            tech_name: "Sam".to_string(),
            items: items
                .iter()
                .map(|(description, material, labor)| LineItemInput::new(description, material, labor))
                .collect(),
            ..DocumentDraft::new()
        }
    }

    pub async fn estimate(crm: &Crm, customer_id: &str, items: &[(&str, &str, &str)]) -> EstimateDocument {
        crm.create_estimate(&draft(customer_id, items), EstimateStatus::Draft)
            .await
            .unwrap()
    }

    pub async fn invoice(crm: &Crm, customer_id: &str, items: &[(&str, &str, &str)]) -> InvoiceDocument {
        crm.create_invoice(&draft(customer_id, items), InvoiceStatus::Sent)
            .await
            .unwrap()
    }

    pub fn payment(invoice_id: &str, amount: f64, method: PaymentMethod) -> NewPayment {
        NewPayment {
            invoice_id: invoice_id.to_string(),
            payment_date: "2024-05-10".to_string(),
            amount,
            payment_method: method,
            reference_number: None,
            notes: None,
        }
    }

    /// SQLite store whose inserts or updates into chosen tables fail like an
    /// unavailable service. Clones share the failure switches.
    #[derive(Clone)]
    pub struct FaultyBackend {
        inner: Arc<SqliteBackend>,
        failing_inserts: Arc<Mutex<HashSet<String>>>,
        failing_updates: Arc<Mutex<HashSet<String>>>,
    }

    impl FaultyBackend {
        pub fn new(inner: SqliteBackend) -> Self {
            Self {
                inner: Arc::new(inner),
                failing_inserts: Arc::default(),
                failing_updates: Arc::default(),
            }
        }

        pub fn failing_insert(table: &str) -> Self {
            let backend = Self::new(SqliteBackend::open_in_memory().unwrap());
            backend.failing_inserts.lock().unwrap().insert(table.to_string());
            backend
        }

        pub fn failing_update(table: &str) -> Self {
            let backend = Self::new(SqliteBackend::open_in_memory().unwrap());
            backend.fail_updates_to(table);
            backend
        }

        pub fn fail_updates_to(&self, table: &str) {
            self.failing_updates.lock().unwrap().insert(table.to_string());
        }

        pub fn into_arc(self) -> Arc<dyn Backend> {
            Arc::new(self)
        }

        fn unavailable(table: &str) -> Error {
            Error::Backend { status: 503, message: format!("{table} is unavailable") }
        }
    }

    #[async_trait]
    impl Backend for FaultyBackend {
        async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
            self.inner.select(table, query).await
        }

        async fn count(&self, table: &str) -> Result<u64> {
            self.inner.count(table).await
        }

        async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
            if self.failing_inserts.lock().unwrap().contains(table) {
                return Err(Self::unavailable(table));
            }
            self.inner.insert(table, rows).await
        }

        async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<Vec<Row>> {
            if self.failing_updates.lock().unwrap().contains(table) {
                return Err(Self::unavailable(table));
            }
            self.inner.update(table, filters, patch).await
        }

        async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
            self.inner.delete(table, filters).await
        }
    }
}
