use serde_json::json;
use tracing::{error, info};

use crate::backend::{from_row, from_rows, to_row, Filter, Order, Query};
use crate::document::missing;
use crate::error::{Error, Result};
use crate::format::now_iso;
use crate::model::{Customer, CustomerPatch, NewCustomer, CUSTOMERS};
use crate::Crm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomerOrder {
    #[default]
    Newest,
    Name,
}

impl Crm {
    pub async fn list_customers(&self, order: CustomerOrder) -> Result<Vec<Customer>> {
        let order = match order {
            CustomerOrder::Newest => Order::desc("created_at"),
            CustomerOrder::Name => Order::asc("name"),
        };
        let rows = self.backend().select(CUSTOMERS, &Query::new().order(order)).await?;
        from_rows(rows)
    }

    pub async fn get_customer(&self, id: &str) -> Result<Customer> {
        let row = self
            .backend()
            .select(CUSTOMERS, &Query::new().eq("id", id).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("customer {id}")))?;
        from_row(row)
    }

    pub async fn create_customer(&self, new: &NewCustomer) -> Result<Customer> {
        if new.name.trim().is_empty() {
            return Err(missing("name"));
        }
        let row = self
            .backend()
            .insert(CUSTOMERS, vec![to_row(new)?])
            .await
            .map_err(|e| {
                error!(op = "create_customer", error = %e, "customer insert failed");
                e
            })?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend { status: 0, message: "customer insert returned no row".to_string() })?;
        let customer: Customer = from_row(row)?;
        info!(id = %customer.id, "customer created");
        Ok(customer)
    }

    pub async fn update_customer(&self, id: &str, patch: &CustomerPatch) -> Result<Customer> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(missing("name"));
        }
        let mut row = to_row(patch)?;
        row.insert("updated_at".to_string(), json!(now_iso()));
        let updated = self
            .backend()
            .update(CUSTOMERS, &[Filter::eq("id", id)], row)
            .await
            .map_err(|e| {
                error!(op = "update_customer", id, error = %e, "customer update failed");
                e
            })?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("customer {id}")))?;
        info!(id, "customer updated");
        from_row(updated)
    }

    pub async fn delete_customer(&self, id: &str) -> Result<()> {
        let deleted = self.backend().delete(CUSTOMERS, &[Filter::eq("id", id)]).await?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("customer {id}")));
        }
        info!(id, "customer deleted");
        Ok(())
    }
}
