//! Recording and removing payments, keeping the invoice balance in step.
//!
//! The invoice update is a compare-and-swap on the `amount_paid` value that
//! was read: it only matches while nobody else has changed the balance. A
//! miss re-reads and tries again. When the balance cannot be written at all,
//! the payment change itself is undone so payments and balances agree.

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::backend::{from_row, from_rows, to_row, Embed, Filter, Order, Query, Row};
use crate::document::missing;
use crate::error::{Error, Result};
use crate::format::{now_iso, parse_amount};
use crate::model::{NewPayment, Payment, PaymentListing, CUSTOMERS, INVOICES, PAYMENTS};
use crate::reconcile::{apply_payment, revert_payment, Balance, Reconciled};
use crate::Crm;

/// Compare-and-swap attempts before a balance update gives up.
pub const MAX_BALANCE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy)]
enum Change {
    Apply,
    Revert,
}

fn number_field(row: &Row, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_amount(s),
        _ => 0.0,
    }
}

pub fn total_received(payments: &[PaymentListing]) -> f64 {
    payments.iter().map(|p| p.payment.amount).sum()
}

impl Crm {
    /// All payments, latest payment date first, with invoice number and
    /// customer name joined.
    pub async fn list_payments(&self) -> Result<Vec<PaymentListing>> {
        let query = Query::new()
            .embed(
                Embed::new(INVOICES, "invoice_id")
                    .columns(&["invoice_number"])
                    .nest(Embed::new(CUSTOMERS, "customer_id").columns(&["name"])),
            )
            .order(Order::desc("payment_date"));
        let rows = self.backend().select(PAYMENTS, &query).await?;
        from_rows(rows)
    }

    pub async fn payments_for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        let query = Query::new()
            .eq("invoice_id", invoice_id)
            .order(Order::asc("payment_date"));
        let rows = self.backend().select(PAYMENTS, &query).await?;
        from_rows(rows)
    }

    /// Applies `amount` to the invoice balance with a conditional update.
    /// `Ok(None)` means the invoice does not exist.
    async fn update_balance(&self, invoice_id: &str, amount: f64, change: Change) -> Result<Option<Reconciled>> {
        for attempt in 1..=MAX_BALANCE_ATTEMPTS {
            let query = Query::new().eq("id", invoice_id).limit(1);
            let Some(invoice) = self.backend().select(INVOICES, &query).await?.into_iter().next() else {
                return Ok(None);
            };

            let read_paid = invoice.get("amount_paid").cloned().unwrap_or(Value::Null);
            let balance = Balance {
                total_amount: number_field(&invoice, "total_amount"),
                amount_paid: number_field(&invoice, "amount_paid"),
            };
            let next = match change {
                Change::Apply => apply_payment(balance, amount),
                Change::Revert => revert_payment(balance, amount),
            };

            let patch = to_row(&json!({
                "amount_paid": next.amount_paid,
                "amount_due": next.amount_due,
                "status": next.status,
                "updated_at": now_iso(),
            }))?;
            let filters = [Filter::eq("id", invoice_id), Filter::eq("amount_paid", read_paid)];
            let updated = self.backend().update(INVOICES, &filters, patch).await?;
            if !updated.is_empty() {
                return Ok(Some(next));
            }
            warn!(invoice_id, attempt, "invoice balance changed concurrently, retrying");
        }

        Err(Error::Conflict(format!(
            "invoice {invoice_id} balance kept changing; gave up after {MAX_BALANCE_ATTEMPTS} attempts"
        )))
    }

    /// Inserts the payment and adds it to the invoice balance. If the balance
    /// cannot be updated the payment is deleted again.
    pub async fn record_payment(&self, new: &NewPayment) -> Result<Payment> {
        if new.invoice_id.trim().is_empty() {
            return Err(missing("invoice"));
        }
        if new.payment_date.trim().is_empty() {
            return Err(missing("payment date"));
        }
        if !new.amount.is_finite() || new.amount <= 0.0 {
            return Err(Error::Validation("payment amount must be positive".to_string()));
        }

        let stored = self
            .backend()
            .insert(PAYMENTS, vec![to_row(new)?])
            .await
            .map_err(|e| {
                error!(op = "record_payment", invoice_id = %new.invoice_id, error = %e, "payment insert failed");
                e
            })?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend { status: 0, message: "payment insert returned no row".to_string() })?;
        let payment: Payment = from_row(stored)?;

        let outcome = match self.update_balance(&payment.invoice_id, payment.amount, Change::Apply).await {
            Ok(Some(next)) => Ok(next),
            Ok(None) => Err(Error::NotFound(format!("invoice {}", payment.invoice_id))),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(next) => {
                info!(
                    payment_id = %payment.id,
                    invoice_id = %payment.invoice_id,
                    amount = payment.amount,
                    status = next.status.as_str(),
                    "payment recorded"
                );
                Ok(payment)
            }
            Err(e) => {
                error!(op = "record_payment", payment_id = %payment.id, error = %e, "balance update failed, removing payment");
                if let Err(undo) = self.backend().delete(PAYMENTS, &[Filter::eq("id", payment.id.as_str())]).await {
                    error!(payment_id = %payment.id, error = %undo, "could not remove payment after failed balance update");
                }
                Err(e)
            }
        }
    }

    /// Deletes the payment and takes it back off the invoice balance. If the
    /// balance cannot be updated the payment is restored.
    pub async fn delete_payment(&self, id: &str) -> Result<()> {
        let query = Query::new().eq("id", id).limit(1);
        let row = self
            .backend()
            .select(PAYMENTS, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("payment {id}")))?;
        let payment: Payment = from_row(row.clone())?;

        self.backend()
            .delete(PAYMENTS, &[Filter::eq("id", id)])
            .await
            .map_err(|e| {
                error!(op = "delete_payment", payment_id = id, error = %e, "payment delete failed");
                e
            })?;

        match self.update_balance(&payment.invoice_id, payment.amount, Change::Revert).await {
            Ok(Some(next)) => {
                info!(payment_id = id, invoice_id = %payment.invoice_id, status = next.status.as_str(), "payment deleted");
                Ok(())
            }
            Ok(None) => {
                warn!(payment_id = id, invoice_id = %payment.invoice_id, "payment deleted; its invoice no longer exists");
                Ok(())
            }
            Err(e) => {
                error!(op = "delete_payment", payment_id = id, error = %e, "balance update failed, restoring payment");
                if let Err(undo) = self.backend().insert(PAYMENTS, vec![row]).await {
                    error!(payment_id = id, error = %undo, "could not restore payment after failed balance update");
                }
                Err(e)
            }
        }
    }
}
