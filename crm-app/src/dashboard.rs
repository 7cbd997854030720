use serde::{Deserialize, Serialize};

use crate::backend::{from_rows, Embed, Order, Query};
use crate::error::Result;
use crate::format::round_cents;
use crate::model::{Estimate, Invoice, CUSTOMERS, ESTIMATES, INVOICES};
use crate::Crm;

const RECENT: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_estimates: u64,
    pub total_invoices: u64,
    /// Sum of invoice totals over every invoice.
    pub total_revenue: f64,
    pub paid_amount: f64,
    pub pending_amount: f64,
    pub recent_estimates: Vec<Estimate>,
    pub recent_invoices: Vec<Invoice>,
}

/// Revenue, paid and pending sums over `invoices`.
pub fn invoice_sums(invoices: &[Invoice]) -> (f64, f64, f64) {
    let (revenue, paid, pending) = invoices.iter().fold((0.0, 0.0, 0.0), |(r, p, d), inv| {
        (r + inv.total_amount, p + inv.amount_paid, d + inv.amount_due)
    });
    (round_cents(revenue), round_cents(paid), round_cents(pending))
}

impl Crm {
    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let backend = self.backend();
        let everything = Query::new();
        let recent = Query::new()
            .embed(Embed::new(CUSTOMERS, "customer_id").columns(&["name"]))
            .order(Order::desc("created_at"))
            .limit(RECENT);

        let (customers, estimates, all_invoices, recent_estimates, recent_invoices) = tokio::try_join!(
            backend.count(CUSTOMERS),
            backend.count(ESTIMATES),
            backend.select(INVOICES, &everything),
            backend.select(ESTIMATES, &recent),
            backend.select(INVOICES, &recent),
        )?;

        let all_invoices: Vec<Invoice> = from_rows(all_invoices)?;
        let (total_revenue, paid_amount, pending_amount) = invoice_sums(&all_invoices);

        Ok(DashboardStats {
            total_customers: customers,
            total_estimates: estimates,
            total_invoices: all_invoices.len() as u64,
            total_revenue,
            paid_amount,
            pending_amount,
            recent_estimates: from_rows(recent_estimates)?,
            recent_invoices: from_rows(recent_invoices)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PaymentMethod;
    use crate::testing;

    #[tokio::test]
    async fn empty_store_has_zero_figures() {
        let crm = testing::memory_crm().await;
        let stats = crm.dashboard().await.unwrap();
        assert_eq!(stats.total_customers, 0);
        assert_eq!(stats.total_revenue, 0.0);
        assert!(stats.recent_invoices.is_empty());
    }

    #[tokio::test]
    async fn sums_cover_every_invoice_and_lists_five_recent() {
        let crm = testing::memory_crm().await;
        let customer = testing::customer(&crm, "Ada").await;
        let mut last = None;
        for _ in 0..6 {
            last = Some(testing::invoice(&crm, &customer.id, &[("Job", "10", "0")]).await);
        }
        testing::estimate(&crm, &customer.id, &[("Quote", "5", "0")]).await;
        let last = last.unwrap();
        crm.record_payment(&testing::payment(&last.invoice.id, 4.0, PaymentMethod::Cash))
            .await
            .unwrap();

        let stats = crm.dashboard().await.unwrap();
        assert_eq!(stats.total_customers, 1);
        assert_eq!(stats.total_estimates, 1);
        assert_eq!(stats.total_invoices, 6);
        assert_eq!(stats.total_revenue, 60.0);
        assert_eq!(stats.paid_amount, 4.0);
        assert_eq!(stats.pending_amount, 56.0);
        assert_eq!(stats.recent_invoices.len(), 5);
        assert_eq!(stats.recent_invoices[0].invoice_number, "INV-0006");
        assert_eq!(stats.recent_invoices[0].customer_name(), "Ada");
        assert_eq!(stats.recent_estimates.len(), 1);
    }
}
