//! Human-readable document numbers: `<PREFIX>-<4+ digits>`.

use regex::Regex;
use tracing::warn;

use crate::backend::{Order, Query};
use crate::model::DocumentKind;
use crate::Crm;

pub fn format_document_number(prefix: &str, next: u64) -> String {
    format!("{}-{:0>4}", prefix, next)
}

/// Next number after `last`, or `<PREFIX>-0001` when there is no previous
/// number or it does not contain `<PREFIX>-<digits>`.
pub fn next_document_number(prefix: &str, last: Option<&str>) -> String {
    let parsed = last.and_then(|last| {
        let pattern = format!(r"{}-(\d+)", regex::escape(prefix));
        let re = Regex::new(&pattern).ok()?;
        let digits = re.captures(last)?.get(1)?.as_str();
        digits.parse::<u64>().ok()
    });

    match parsed {
        Some(n) => format_document_number(prefix, n.saturating_add(1)),
        None => format_document_number(prefix, 1),
    }
}

impl Crm {
    /// Number field of the most recently created document of `kind`.
    pub async fn latest_document_number(&self, kind: DocumentKind) -> crate::Result<Option<String>> {
        let query = Query::new()
            .order(Order::desc("created_at"))
            .limit(1);
        let rows = self.backend().select(kind.table(), &query).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(kind.number_column()))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Number a new document of `kind` would get. A failed lookup is logged and
    /// falls back to the first number; the backend's unique constraint is the
    /// final guard against collisions.
    pub async fn preview_document_number(&self, kind: DocumentKind) -> String {
        match self.latest_document_number(kind).await {
            Ok(last) => next_document_number(kind.prefix(), last.as_deref()),
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "could not read latest document number");
                format_document_number(kind.prefix(), 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_and_pads() {
        assert_eq!(next_document_number("EST", Some("EST-0042")), "EST-0043");
        assert_eq!(next_document_number("INV", Some("INV-0009")), "INV-0010");
        assert_eq!(next_document_number("INV", Some("INV-9999")), "INV-10000");
    }

    #[test]
    fn falls_back_to_first_number() {
        assert_eq!(next_document_number("EST", None), "EST-0001");
        assert_eq!(next_document_number("EST", Some("X")), "EST-0001");
        assert_eq!(next_document_number("EST", Some("INV-0042")), "EST-0001");
        assert_eq!(next_document_number("EST", Some("")), "EST-0001");
    }

    #[test]
    fn pattern_is_found_anywhere_in_the_value() {
        assert_eq!(next_document_number("INV", Some("old INV-0005 (copy)")), "INV-0006");
    }

    #[tokio::test]
    async fn preview_follows_latest_row() {
        let crm = crate::testing::memory_crm().await;
        assert_eq!(crm.preview_document_number(DocumentKind::Estimate).await, "EST-0001");

        let customer = crate::testing::customer(&crm, "Ada").await;
        crate::testing::estimate(&crm, &customer.id, &[("Leak", "10", "5")]).await;
        assert_eq!(crm.preview_document_number(DocumentKind::Estimate).await, "EST-0002");
        assert_eq!(crm.preview_document_number(DocumentKind::Invoice).await, "INV-0001");
    }
}
