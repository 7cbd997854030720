use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{from_row, from_rows, to_row, Embed, Order, Query};
use crate::document::DocumentDraft;
use crate::error::{Error, Result};
use crate::format::round_cents;
use crate::model::{DocumentKind, Invoice, InvoiceStatus, LineItem, Payment, CUSTOMERS, INVOICES};
use crate::Crm;

/// An invoice with its customer, line items and payment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
    pub payments: Vec<Payment>,
}

impl Crm {
    /// Newest first, with the customer name joined.
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>> {
        let query = Query::new()
            .embed(Embed::new(CUSTOMERS, "customer_id").columns(&["name"]))
            .order(Order::desc("created_at"));
        let rows = self.backend().select(INVOICES, &query).await?;
        from_rows(rows)
    }

    /// Invoices that can still take a payment, by invoice number.
    pub async fn open_invoices(&self) -> Result<Vec<Invoice>> {
        let query = Query::new()
            .neq("status", InvoiceStatus::Paid.as_str())
            .neq("status", InvoiceStatus::Cancelled.as_str())
            .embed(Embed::new(CUSTOMERS, "customer_id").columns(&["name"]))
            .order(Order::asc("invoice_number"));
        let rows = self.backend().select(INVOICES, &query).await?;
        from_rows(rows)
    }

    pub async fn get_invoice(&self, id: &str) -> Result<InvoiceDocument> {
        let query = Query::new()
            .eq("id", id)
            .embed(Embed::new(CUSTOMERS, "customer_id"))
            .limit(1);
        let row = self
            .backend()
            .select(INVOICES, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("invoice {id}")))?;
        let invoice: Invoice = from_row(row)?;
        let items = self.line_items(DocumentKind::Invoice, id).await?;
        let payments = self.payments_for_invoice(id).await?;
        Ok(InvoiceDocument { invoice, items, payments })
    }

    /// New invoices start with nothing paid and the full total due.
    pub async fn create_invoice(&self, draft: &DocumentDraft, status: InvoiceStatus) -> Result<InvoiceDocument> {
        let total = round_cents(draft.total());
        let header = to_row(&json!({
            "customer_id": draft.customer_id,
            "invoice_date": draft.date,
            "due_date": draft.due_date,
            "work_completed_date": draft.work_completed_date,
            "tech_name": draft.tech_name,
            "notes": draft.notes,
            "status": status,
            "total_amount": total,
            "amount_paid": 0.0,
            "amount_due": total,
        }))?;
        let (parent, items) = self.create_document(DocumentKind::Invoice, draft, header).await?;
        Ok(InvoiceDocument {
            invoice: from_row(parent)?,
            items: from_rows(items)?,
            payments: Vec::new(),
        })
    }

    /// Sets the status without touching the balance.
    pub async fn set_invoice_status(&self, id: &str, status: InvoiceStatus) -> Result<Invoice> {
        let row = self
            .set_document_status(DocumentKind::Invoice, id, status.as_str())
            .await?;
        from_row(row)
    }

    pub async fn delete_invoice(&self, id: &str) -> Result<()> {
        self.delete_document(DocumentKind::Invoice, id).await
    }
}
