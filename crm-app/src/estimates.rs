use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{from_row, from_rows, to_row, Embed, Order, Query};
use crate::document::DocumentDraft;
use crate::error::{Error, Result};
use crate::format::round_cents;
use crate::model::{DocumentKind, Estimate, EstimateStatus, LineItem, CUSTOMERS, ESTIMATES};
use crate::Crm;

/// An estimate with its customer and line items, as shown or printed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateDocument {
    pub estimate: Estimate,
    pub items: Vec<LineItem>,
}

impl Crm {
    /// Newest first, with the customer name joined.
    pub async fn list_estimates(&self) -> Result<Vec<Estimate>> {
        let query = Query::new()
            .embed(Embed::new(CUSTOMERS, "customer_id").columns(&["name"]))
            .order(Order::desc("created_at"));
        let rows = self.backend().select(ESTIMATES, &query).await?;
        from_rows(rows)
    }

    pub async fn get_estimate(&self, id: &str) -> Result<EstimateDocument> {
        let query = Query::new()
            .eq("id", id)
            .embed(Embed::new(CUSTOMERS, "customer_id"))
            .limit(1);
        let row = self
            .backend()
            .select(ESTIMATES, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("estimate {id}")))?;
        let estimate: Estimate = from_row(row)?;
        let items = self.line_items(DocumentKind::Estimate, id).await?;
        Ok(EstimateDocument { estimate, items })
    }

    pub async fn create_estimate(&self, draft: &DocumentDraft, status: EstimateStatus) -> Result<EstimateDocument> {
        let header = to_row(&json!({
            "customer_id": draft.customer_id,
            "estimate_date": draft.date,
            "expiry_date": draft.due_date,
            "tech_name": draft.tech_name,
            "notes": draft.notes,
            "status": status,
            "total_amount": round_cents(draft.total()),
        }))?;
        let (parent, items) = self.create_document(DocumentKind::Estimate, draft, header).await?;
        Ok(EstimateDocument {
            estimate: from_row(parent)?,
            items: from_rows(items)?,
        })
    }

    pub async fn set_estimate_status(&self, id: &str, status: EstimateStatus) -> Result<Estimate> {
        let row = self
            .set_document_status(DocumentKind::Estimate, id, status.as_str())
            .await?;
        from_row(row)
    }

    pub async fn delete_estimate(&self, id: &str) -> Result<()> {
        self.delete_document(DocumentKind::Estimate, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn create_returns_the_read_view() {
        let crm = testing::memory_crm().await;
        let customer = testing::customer(&crm, "Ada").await;
        let mut draft = testing::draft(&customer.id, &[("Leak", "10", "5"), ("Valve", "", "2.5")]);
        draft.due_date = Some("2024-02-01".to_string());

        let doc = crm.create_estimate(&draft, EstimateStatus::Sent).await.unwrap();
        assert_eq!(doc.estimate.estimate_number, "EST-0001");
        assert_eq!(doc.estimate.total_amount, 17.5);
        assert_eq!(doc.estimate.status, EstimateStatus::Sent);
        assert_eq!(doc.estimate.expiry_date.as_deref(), Some("2024-02-01"));
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[1].sort_order, 1);
        assert_eq!(doc.items[1].total_cost, 2.5);

        let fetched = crm.get_estimate(&doc.estimate.id).await.unwrap();
        assert_eq!(fetched.estimate.customer_name(), "Ada");
        assert_eq!(
            fetched.items.iter().map(|i| i.description.as_str()).collect::<Vec<_>>(),
            vec!["Leak", "Valve"]
        );
    }

    #[tokio::test]
    async fn validation_happens_before_any_write() {
        let crm = testing::memory_crm().await;
        let mut draft = testing::draft("c1", &[("Leak", "10", "5")]);
        draft.tech_name = "  ".to_string();
        let err = crm.create_estimate(&draft, EstimateStatus::Draft).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(crm.backend().count(ESTIMATES).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_joins_customer_names_newest_first() {
        let crm = testing::memory_crm().await;
        let ada = testing::customer(&crm, "Ada").await;
        let bob = testing::customer(&crm, "Bob").await;
        testing::estimate(&crm, &ada.id, &[("a", "1", "1")]).await;
        testing::estimate(&crm, &bob.id, &[("b", "2", "2")]).await;

        let list = crm.list_estimates().await.unwrap();
        let names: Vec<&str> = list.iter().map(|e| e.customer_name()).collect();
        assert_eq!(names, vec!["Bob", "Ada"]);
        assert_eq!(list[0].estimate_number, "EST-0002");
    }

    #[tokio::test]
    async fn any_status_can_follow_any_other() {
        let crm = testing::memory_crm().await;
        let customer = testing::customer(&crm, "Ada").await;
        let doc = testing::estimate(&crm, &customer.id, &[("a", "1", "1")]).await;

        let rejected = crm.set_estimate_status(&doc.estimate.id, EstimateStatus::Rejected).await.unwrap();
        assert_eq!(rejected.status, EstimateStatus::Rejected);
        assert!(rejected.updated_at.is_some());
        let draft = crm.set_estimate_status(&doc.estimate.id, EstimateStatus::Draft).await.unwrap();
        assert_eq!(draft.status, EstimateStatus::Draft);

        let missing = crm.set_estimate_status("nope", EstimateStatus::Sent).await.unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_line_items_too() {
        let crm = testing::memory_crm().await;
        let customer = testing::customer(&crm, "Ada").await;
        let doc = testing::estimate(&crm, &customer.id, &[("a", "1", "1"), ("b", "1", "1")]).await;

        crm.delete_estimate(&doc.estimate.id).await.unwrap();
        assert_eq!(crm.backend().count(ESTIMATES).await.unwrap(), 0);
        assert_eq!(crm.backend().count("estimate_line_items").await.unwrap(), 0);
        assert!(matches!(crm.get_estimate(&doc.estimate.id).await, Err(Error::NotFound(_))));
        assert!(matches!(crm.delete_estimate(&doc.estimate.id).await, Err(Error::NotFound(_))));
    }
}
