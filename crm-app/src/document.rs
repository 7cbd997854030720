//! Estimate/invoice form state and the shared "header + line items" write.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::backend::{from_rows, Filter, Order, Query, Row};
use crate::error::{Error, Result};
use crate::format::{parse_amount, round_cents};
use crate::model::{DocumentKind, LineItem};
use crate::numbering::next_document_number;
use crate::Crm;

/// How many times a generated number is retried after losing a race for it.
pub const MAX_NUMBER_ATTEMPTS: usize = 5;

/// One editable row of the form. Costs stay as typed; they are read with
/// [`parse_amount`] whenever a number is needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub material_cost: String,
    pub labor_cost: String,
}

impl LineItemInput {
    pub fn new(description: &str, material_cost: &str, labor_cost: &str) -> Self {
        Self {
            description: description.to_string(),
            material_cost: material_cost.to_string(),
            labor_cost: labor_cost.to_string(),
        }
    }

    pub fn material(&self) -> f64 {
        parse_amount(&self.material_cost)
    }

    pub fn labor(&self) -> f64 {
        parse_amount(&self.labor_cost)
    }
}

pub fn line_total(item: &LineItemInput) -> f64 {
    item.material() + item.labor()
}

pub fn grand_total(items: &[LineItemInput]) -> f64 {
    items.iter().map(line_total).sum()
}

/// The create form for either document kind. `due_date` is the expiry date
/// for estimates; `work_completed_date` only applies to invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDraft {
    /// Explicit number; generated when `None`.
    pub number: Option<String>,
    pub customer_id: String,
    pub date: String,
    pub due_date: Option<String>,
    pub work_completed_date: Option<String>,
    pub tech_name: String,
    pub notes: Option<String>,
    pub items: Vec<LineItemInput>,
}

impl Default for DocumentDraft {
    fn default() -> Self {
        Self {
            number: None,
            customer_id: String::new(),
            date: crate::format::today_ymd(),
            due_date: None,
            work_completed_date: None,
            tech_name: String::new(),
            notes: None,
            items: vec![LineItemInput::default()],
        }
    }
}

impl DocumentDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self) {
        self.items.push(LineItemInput::default());
    }

    /// Removes row `index` unless it is the only one left.
    pub fn remove_item(&mut self, index: usize) {
        if self.items.len() > 1 && index < self.items.len() {
            self.items.remove(index);
        }
    }

    pub fn set_item(&mut self, index: usize, item: LineItemInput) {
        if let Some(slot) = self.items.get_mut(index) {
            *slot = item;
        }
    }

    pub fn total(&self) -> f64 {
        grand_total(&self.items)
    }

    /// Checks the fields the form marks required. Invoices also need their
    /// due and work-completed dates; an estimate's expiry date is optional.
    pub fn validate(&self, kind: DocumentKind) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(missing("customer"));
        }
        if self.tech_name.trim().is_empty() {
            return Err(missing("technician name"));
        }
        if self.date.trim().is_empty() {
            return Err(missing("date"));
        }
        if kind == DocumentKind::Invoice {
            if is_blank(self.due_date.as_deref()) {
                return Err(missing("due date"));
            }
            if is_blank(self.work_completed_date.as_deref()) {
                return Err(missing("work completed date"));
            }
        }
        if self.items.is_empty() {
            return Err(missing("at least one line item"));
        }
        if let Some(row) = self.items.iter().position(|i| i.description.trim().is_empty()) {
            return Err(Error::Validation(format!("line item {} has no description", row + 1)));
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub(crate) fn missing(field: &str) -> Error {
    Error::Validation(format!("missing required field: {field}"))
}

/// Line-item rows for `parent_id`, in form order.
pub(crate) fn line_item_rows(kind: DocumentKind, parent_id: &str, items: &[LineItemInput]) -> Vec<Row> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mut row = Row::new();
            row.insert(kind.parent_key().to_string(), json!(parent_id));
            row.insert("description".to_string(), json!(item.description));
            row.insert("material_cost".to_string(), json!(item.material()));
            row.insert("labor_cost".to_string(), json!(item.labor()));
            row.insert("total_cost".to_string(), json!(round_cents(line_total(item))));
            row.insert("sort_order".to_string(), json!(index));
            row
        })
        .collect()
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

impl Crm {
    /// Inserts the header row under a document number, retrying with a fresh
    /// number when a generated one is taken. An explicit number that is taken
    /// is reported as a conflict.
    async fn insert_numbered(&self, kind: DocumentKind, explicit: Option<&str>, header: &Row) -> Result<Row> {
        let explicit = explicit.map(str::trim).filter(|n| !n.is_empty());
        let attempts = if explicit.is_some() { 1 } else { MAX_NUMBER_ATTEMPTS };

        let mut rejected: Option<String> = None;
        for attempt in 1..=attempts {
            let number = match explicit {
                Some(n) => n.to_string(),
                None => {
                    let last = self.latest_document_number(kind).await?;
                    let fresh = next_document_number(kind.prefix(), last.as_deref());
                    match rejected.as_deref() {
                        // Never go back below a number that was just refused.
                        // Same prefix and zero padding, so (length, text) orders numerically.
                        Some(taken) => {
                            let bumped = next_document_number(kind.prefix(), Some(taken));
                            if (bumped.len(), &bumped) > (fresh.len(), &fresh) {
                                bumped
                            } else {
                                fresh
                            }
                        }
                        None => fresh,
                    }
                }
            };
            let mut row = header.clone();
            row.insert(kind.number_column().to_string(), json!(number));

            match self.backend().insert(kind.table(), vec![row]).await {
                Ok(mut stored) if !stored.is_empty() => return Ok(stored.remove(0)),
                Ok(_) => {
                    return Err(Error::Backend {
                        status: 0,
                        message: format!("insert into {} returned no row", kind.table()),
                    })
                }
                Err(e) if e.is_conflict() && explicit.is_none() => {
                    warn!(kind = kind.as_str(), number = %number, attempt, "document number taken, retrying");
                    rejected = Some(number);
                }
                Err(e) if e.is_conflict() => {
                    return Err(Error::Conflict(format!("{} {} already exists", kind.as_str(), number)));
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict(format!(
            "could not allocate a {} number after {} attempts",
            kind.as_str(),
            attempts
        )))
    }

    /// Writes a document header followed by its line items. When the
    /// line-item insert fails the header is deleted again and the line-item
    /// error is returned.
    pub(crate) async fn create_document(
        &self,
        kind: DocumentKind,
        draft: &DocumentDraft,
        header: Row,
    ) -> Result<(Row, Vec<Row>)> {
        draft.validate(kind)?;

        let parent = self
            .insert_numbered(kind, draft.number.as_deref(), &header)
            .await
            .map_err(|e| {
                error!(op = "create_document", kind = kind.as_str(), error = %e, "header insert failed");
                e
            })?;
        let parent_id = row_id(&parent)
            .ok_or_else(|| Error::Backend { status: 0, message: "stored document has no id".to_string() })?
            .to_string();

        let rows = line_item_rows(kind, &parent_id, &draft.items);
        let items = match self.backend().insert(kind.line_item_table(), rows).await {
            Ok(items) => items,
            Err(e) => {
                error!(op = "create_document", kind = kind.as_str(), id = %parent_id, error = %e, "line item insert failed, removing document");
                if let Err(undo) = self
                    .backend()
                    .delete(kind.table(), &[Filter::eq("id", parent_id.as_str())])
                    .await
                {
                    error!(kind = kind.as_str(), id = %parent_id, error = %undo, "could not remove orphaned document");
                }
                return Err(e);
            }
        };

        let number = parent.get(kind.number_column()).and_then(Value::as_str).unwrap_or_default();
        info!(
            kind = kind.as_str(),
            id = %parent_id,
            number,
            items = items.len(),
            "document created"
        );
        Ok((parent, items))
    }

    pub(crate) async fn line_items(&self, kind: DocumentKind, parent_id: &str) -> Result<Vec<LineItem>> {
        let query = Query::new()
            .eq(kind.parent_key(), parent_id)
            .order(Order::asc("sort_order"));
        let rows = self.backend().select(kind.line_item_table(), &query).await?;
        from_rows(rows)
    }

    /// Deletes the line items and then the document itself.
    pub(crate) async fn delete_document(&self, kind: DocumentKind, id: &str) -> Result<()> {
        self.backend()
            .delete(kind.line_item_table(), &[Filter::eq(kind.parent_key(), id)])
            .await?;
        let deleted = self.backend().delete(kind.table(), &[Filter::eq("id", id)]).await?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("{} {}", kind.as_str(), id)));
        }
        info!(kind = kind.as_str(), id, "document deleted");
        Ok(())
    }

    /// Single-field status change stamped with `updated_at`.
    pub(crate) async fn set_document_status(&self, kind: DocumentKind, id: &str, status: &str) -> Result<Row> {
        let mut patch = Row::new();
        patch.insert("status".to_string(), json!(status));
        patch.insert("updated_at".to_string(), json!(crate::format::now_iso()));
        let mut rows = self
            .backend()
            .update(kind.table(), &[Filter::eq("id", id)], patch)
            .await
            .map_err(|e| {
                error!(op = "set_status", kind = kind.as_str(), id, error = %e, "status update failed");
                e
            })?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("{} {}", kind.as_str(), id)));
        }
        info!(kind = kind.as_str(), id, status, "status changed");
        Ok(rows.remove(0))
    }
}
