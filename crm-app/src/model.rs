use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

pub const CUSTOMERS: &str = "customers";
pub const ESTIMATES: &str = "estimates";
pub const ESTIMATE_LINE_ITEMS: &str = "estimate_line_items";
pub const INVOICES: &str = "crm_invoices";
pub const INVOICE_LINE_ITEMS: &str = "crm_invoice_line_items";
pub const PAYMENTS: &str = "payments";

pub const TABLES: [&str; 6] = [
    CUSTOMERS,
    ESTIMATES,
    ESTIMATE_LINE_ITEMS,
    INVOICES,
    INVOICE_LINE_ITEMS,
    PAYMENTS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Estimate,
    Invoice,
}

impl DocumentKind {
    pub fn table(self) -> &'static str {
        match self {
            DocumentKind::Estimate => ESTIMATES,
            DocumentKind::Invoice => INVOICES,
        }
    }

    pub fn line_item_table(self) -> &'static str {
        match self {
            DocumentKind::Estimate => ESTIMATE_LINE_ITEMS,
            DocumentKind::Invoice => INVOICE_LINE_ITEMS,
        }
    }

    /// Foreign key column on the line-item table.
    pub fn parent_key(self) -> &'static str {
        match self {
            DocumentKind::Estimate => "estimate_id",
            DocumentKind::Invoice => "invoice_id",
        }
    }

    pub fn number_column(self) -> &'static str {
        match self {
            DocumentKind::Estimate => "estimate_number",
            DocumentKind::Invoice => "invoice_number",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Estimate => "EST",
            DocumentKind::Invoice => "INV",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Estimate => "estimate",
            DocumentKind::Invoice => "invoice",
        }
    }
}

/// Declares a lowercase string enum with `as_str`, `ALL`, `Display` and
/// `FromStr` so statuses round-trip through the backend and the CLI.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lower)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("unknown value '{}', expected one of: {}", s, allowed.join(", "))
                    })
            }
        }
    };
}

string_enum!(EstimateStatus {
    Draft => "draft",
    Sent => "sent",
    Approved => "approved",
    Rejected => "rejected",
    Expired => "expired",
});

string_enum!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Partial => "partial",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

string_enum!(PaymentMethod {
    Cash => "cash",
    Check => "check",
    Card => "card",
    Transfer => "transfer",
    Other => "other",
});

impl Default for EstimateStatus {
    fn default() -> Self {
        EstimateStatus::Draft
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

/// Nullable columns come back as `null` from the REST backend; read them as
/// the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Customer columns embedded into document rows (`customers(name)` or
/// `customers(*)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub id: String,
    pub estimate_number: String,
    pub customer_id: String,
    pub estimate_date: String,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tech_name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: EstimateStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_amount: f64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers: Option<CustomerSummary>,
}

impl Estimate {
    pub fn customer_name(&self) -> &str {
        self.customers.as_ref().map(|c| c.name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub invoice_date: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub work_completed_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tech_name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: InvoiceStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount_paid: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount_due: f64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers: Option<CustomerSummary>,
}

impl Invoice {
    pub fn customer_name(&self) -> &str {
        self.customers.as_ref().map(|c| c.name.as_str()).unwrap_or("")
    }
}

/// A stored line item; the parent foreign key is not part of the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub material_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labor_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub payment_date: String,
    pub amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: String,
    pub payment_date: String,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Invoice columns embedded into payment rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub invoice_number: String,
    #[serde(default)]
    pub customers: Option<CustomerSummary>,
}

/// Payment row as listed, with the invoice number and customer name joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentListing {
    #[serde(flatten)]
    pub payment: Payment,
    #[serde(default)]
    pub crm_invoices: Option<InvoiceSummary>,
}

impl PaymentListing {
    pub fn invoice_number(&self) -> &str {
        self.crm_invoices
            .as_ref()
            .map(|i| i.invoice_number.as_str())
            .unwrap_or("")
    }

    pub fn customer_name(&self) -> &str {
        self.crm_invoices
            .as_ref()
            .and_then(|i| i.customers.as_ref())
            .map(|c| c.name.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_parse_case_insensitively() {
        assert_eq!("Paid".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Paid);
        assert_eq!("expired".parse::<EstimateStatus>().unwrap(), EstimateStatus::Expired);
        assert_eq!("transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
        let err = "settled".parse::<InvoiceStatus>().unwrap_err();
        assert!(err.contains("cancelled"));
    }

    #[test]
    fn invoice_row_with_embedded_customer_deserializes() {
        let row = json!({
            "id": "i1",
            "invoice_number": "INV-0007",
            "customer_id": "c1",
            "invoice_date": "2024-05-01",
            "status": "partial",
            "total_amount": 100,
            "amount_paid": 60.0,
            "amount_due": 40.0,
            "customers": { "name": "Ada" }
        });
        let invoice: Invoice = serde_json::from_value(row).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Partial);
        assert_eq!(invoice.total_amount, 100.0);
        assert_eq!(invoice.customer_name(), "Ada");
        assert!(invoice.due_date.is_none());
    }

    #[test]
    fn null_columns_read_as_defaults() {
        let row = json!({
            "id": "e1",
            "estimate_number": "EST-0003",
            "customer_id": "c1",
            "estimate_date": "2024-05-01",
            "tech_name": null,
            "status": null,
            "total_amount": null,
            "customers": { "name": null }
        });
        let estimate: Estimate = serde_json::from_value(row).unwrap();
        assert_eq!(estimate.tech_name, "");
        assert_eq!(estimate.status, EstimateStatus::Draft);
        assert_eq!(estimate.total_amount, 0.0);
        assert_eq!(estimate.customer_name(), "");

        let item: LineItem = serde_json::from_value(json!({
            "id": "l1",
            "description": "Leak",
            "material_cost": null,
            "labor_cost": 5,
            "total_cost": 5,
            "sort_order": null
        }))
        .unwrap();
        assert_eq!(item.material_cost, 0.0);
        assert_eq!(item.sort_order, 0);
    }

    #[test]
    fn payment_listing_reads_nested_embeds() {
        let row = json!({
            "id": "p1",
            "invoice_id": "i1",
            "payment_date": "2024-05-02",
            "amount": 25.5,
            "payment_method": "check",
            "crm_invoices": { "invoice_number": "INV-0001", "customers": { "name": "Bob" } }
        });
        let listing: PaymentListing = serde_json::from_value(row).unwrap();
        assert_eq!(listing.payment.payment_method, PaymentMethod::Check);
        assert_eq!(listing.invoice_number(), "INV-0001");
        assert_eq!(listing.customer_name(), "Bob");
    }

    #[test]
    fn document_kinds_name_their_tables() {
        assert_eq!(DocumentKind::Invoice.table(), "crm_invoices");
        assert_eq!(DocumentKind::Invoice.line_item_table(), "crm_invoice_line_items");
        assert_eq!(DocumentKind::Estimate.parent_key(), "estimate_id");
        assert_eq!(DocumentKind::Estimate.prefix(), "EST");
    }
}
