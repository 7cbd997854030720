use super::branded::{self, Band};
use super::canvas::Canvas;
use crate::config::CompanyProfile;
use crate::estimates::EstimateDocument;
use crate::format::{format_currency, format_date, round_cents};

/// `0.0825` as `8.25%`.
fn rate_label(rate: f64) -> String {
    let percent = (rate * 10_000.0).round() / 100.0;
    format!("TAX ({percent}%)")
}

/// Subtotal, tax and total for an estimate at `tax_rate` (a fraction).
pub fn estimate_totals(subtotal: f64, tax_rate: f64) -> (f64, f64, f64) {
    let tax = round_cents(subtotal * tax_rate);
    (round_cents(subtotal), tax, round_cents(subtotal + tax))
}

/// The branded estimate. Same frame as the invoice with an expiry date
/// instead of a due date and a tax line in the totals.
pub fn layout_estimate(doc: &EstimateDocument, company: &CompanyProfile, has_logo: bool, tax_rate: f64) -> Canvas {
    let estimate = &doc.estimate;
    let mut c = branded::new_canvas();

    let expires = estimate
        .expiry_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(format_date)
        .unwrap_or_else(|| "-".to_string());

    branded::header(
        &mut c,
        company,
        has_logo,
        "ESTIMATE",
        &[
            Band::blue("ESTIMATE #", estimate.estimate_number.clone()),
            Band::gray("DATE", format_date(&estimate.estimate_date)),
            Band { bold_value: false, ..Band::blue("EXPIRES", expires) },
        ],
    );

    let tech = estimate.tech_name.trim();
    branded::party_boxes(
        &mut c,
        estimate.customers.as_ref(),
        &[
            format!("Technician: {}", if tech.is_empty() { "-" } else { tech }),
            format!("Status: {}", estimate.status.as_str().to_uppercase()),
        ],
    );

    branded::items_table(&mut c, &doc.items);

    let tax_label = rate_label(tax_rate);
    let (subtotal, tax, total) = estimate_totals(estimate.total_amount, tax_rate);
    branded::totals_box(
        &mut c,
        &[
            Band::blue("SUBTOTAL", format_currency(subtotal)),
            Band::gray(&tax_label, format_currency(tax)),
            Band::blue("TOTAL", format_currency(total)),
        ],
    );

    branded::text_block(&mut c, "NOTES", estimate.notes.as_deref());
    branded::signature_footer(&mut c, company, "estimate");
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerSummary, Estimate, EstimateStatus, LineItem};
    use crate::pdf::canvas::DrawOp;

    fn sample_estimate(items: usize, notes: Option<&str>) -> EstimateDocument {
        EstimateDocument {
            estimate: Estimate {
                id: "e1".to_string(),
                estimate_number: "EST-0007".to_string(),
                customer_id: "c1".to_string(),
                estimate_date: "2024-06-01".to_string(),
                expiry_date: Some("2024-07-01".to_string()),
                tech_name: "Sam".to_string(),
                notes: notes.map(str::to_string),
                status: EstimateStatus::Sent,
                total_amount: 200.0,
                created_at: None,
                updated_at: None,
                customers: Some(CustomerSummary { name: "Bob".to_string(), ..Default::default() }),
            },
            items: (0..items)
                .map(|i| LineItem {
                    id: format!("li{i}"),
                    description: format!("Item {i}"),
                    material_cost: 60.0,
                    labor_cost: 40.0,
                    total_cost: 100.0,
                    sort_order: i as i64,
                })
                .collect(),
        }
    }

    fn texts(c: &Canvas) -> Vec<String> {
        c.pages
            .iter()
            .flat_map(|p| p.ops.iter())
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn totals_include_configured_tax() {
        assert_eq!(estimate_totals(200.0, 0.0), (200.0, 0.0, 200.0));
        assert_eq!(estimate_totals(100.0, 0.0825), (100.0, 8.25, 108.25));
        assert_eq!(rate_label(0.0825), "TAX (8.25%)");
        assert_eq!(rate_label(0.0), "TAX (0%)");
    }

    #[test]
    fn estimate_layout_shows_expiry_and_tax() {
        let c = layout_estimate(&sample_estimate(2, Some("Valid for 30 days.")), &CompanyProfile::default(), false, 0.1);
        assert_eq!(c.page_count(), 1);
        let texts = texts(&c);
        for expected in [
            "ESTIMATE",
            "EST-0007",
            "EXPIRES",
            "7/1/2024",
            "Status: SENT",
            "SUBTOTAL",
            "TAX (10%)",
            "$20.00",
            "$220.00",
            "NOTES",
            "Valid for 30 days.",
        ] {
            assert!(texts.iter().any(|t| t == expected), "missing {expected}");
        }
        assert!(texts.iter().any(|t| t.contains("this estimate number")));
    }

    #[test]
    fn empty_notes_render_a_placeholder() {
        let c = layout_estimate(&sample_estimate(1, None), &CompanyProfile::default(), false, 0.0);
        assert!(texts(&c).iter().any(|t| t == "\u{2014}"));
    }
}
