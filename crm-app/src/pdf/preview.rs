//! The quick single-column A4 document. Measurements are millimetres.

use super::canvas::{Align, Canvas, TextStyle, A4_MM, BLACK};
use crate::estimates::EstimateDocument;
use crate::format::{format_currency, format_date};
use crate::invoices::InvoiceDocument;
use crate::model::{CustomerSummary, LineItem};

const LEFT: f32 = 20.0;
const TOP: f32 = 20.0;
/// Rows start on a new page once the cursor passes 270 mm.
const BOTTOM_RESERVE: f32 = 27.0;
const MATERIAL_X: f32 = 120.0;
const LABOR_X: f32 = 145.0;
const TOTAL_X: f32 = 170.0;
const DESCRIPTION_W: f32 = 95.0;

struct PreviewFields<'a> {
    title: &'a str,
    header_lines: Vec<String>,
    customer: Option<&'a CustomerSummary>,
    tech_name: &'a str,
    items: &'a [LineItem],
    total: f64,
    notes: Option<&'a str>,
}

pub fn layout_invoice_preview(doc: &InvoiceDocument) -> Canvas {
    let invoice = &doc.invoice;
    layout_preview(PreviewFields {
        title: "INVOICE",
        header_lines: vec![
            format!("Invoice #: {}", invoice.invoice_number),
            format!("Invoice Date: {}", format_date(&invoice.invoice_date)),
            format!(
                "Work Completed: {}",
                format_date(invoice.work_completed_date.as_deref().unwrap_or_default())
            ),
        ],
        customer: invoice.customers.as_ref(),
        tech_name: &invoice.tech_name,
        items: &doc.items,
        total: invoice.total_amount,
        notes: invoice.notes.as_deref(),
    })
}

pub fn layout_estimate_preview(doc: &EstimateDocument) -> Canvas {
    let estimate = &doc.estimate;
    let mut header_lines = vec![
        format!("Estimate #: {}", estimate.estimate_number),
        format!("Date: {}", format_date(&estimate.estimate_date)),
    ];
    if let Some(expiry) = estimate.expiry_date.as_deref().filter(|d| !d.trim().is_empty()) {
        header_lines.push(format!("Expires: {}", format_date(expiry)));
    }
    layout_preview(PreviewFields {
        title: "ESTIMATE",
        header_lines,
        customer: estimate.customers.as_ref(),
        tech_name: &estimate.tech_name,
        items: &doc.items,
        total: estimate.total_amount,
        notes: estimate.notes.as_deref(),
    })
}

fn layout_preview(fields: PreviewFields<'_>) -> Canvas {
    let mut c = Canvas::new(A4_MM, TOP, BOTTOM_RESERVE);
    let right = c.geometry.width - LEFT;
    let body = TextStyle::regular(10.0);
    let label = TextStyle::bold(10.0);

    let center = c.geometry.width / 2.0;
    c.text(center, c.y, fields.title, &TextStyle::bold(24.0).align(Align::Center));
    c.y += 15.0;

    for line in &fields.header_lines {
        c.text(LEFT, c.y, line, &body);
        c.y += 6.0;
    }

    c.y += 9.0;
    c.text(LEFT, c.y, "BILL TO:", &label);
    c.y += 6.0;
    if let Some(customer) = fields.customer {
        c.text(LEFT, c.y, &customer.name, &body);
        c.y += 6.0;
        for line in c.wrap(customer.address.as_deref().unwrap_or_default(), &body, 80.0) {
            c.text(LEFT, c.y, &line, &body);
            c.y += 6.0;
        }
    }

    c.y += 10.0;
    c.text(LEFT, c.y, "TECHNICIAN:", &label);
    c.y += 6.0;
    c.text(LEFT, c.y, fields.tech_name, &body);

    c.y += 15.0;
    c.text(LEFT, c.y, "LINE ITEMS", &TextStyle::bold(12.0));
    c.y += 8.0;

    let head = TextStyle::bold(9.0);
    c.text(LEFT, c.y, "Description", &head);
    c.text(MATERIAL_X, c.y, "Material", &head);
    c.text(LABOR_X, c.y, "Labor", &head);
    c.text(TOTAL_X, c.y, "Total", &head);
    c.y += 5.0;
    c.line(LEFT, c.y, right, c.y, BLACK);
    c.y += 6.0;

    let cell = TextStyle::regular(9.0);
    for item in fields.items {
        c.ensure_space(0.0);
        let lines = c.wrap(&item.description, &cell, DESCRIPTION_W);
        for (i, line) in lines.iter().enumerate() {
            c.text(LEFT, c.y + i as f32 * 5.0, line, &cell);
        }
        c.text(MATERIAL_X, c.y, &format_currency(item.material_cost), &cell);
        c.text(LABOR_X, c.y, &format_currency(item.labor_cost), &cell);
        c.text(TOTAL_X, c.y, &format_currency(item.total_cost), &cell);
        c.y += (lines.len() as f32 * 5.0).max(6.0) + 4.0;
    }

    c.y += 5.0;
    c.line(LEFT, c.y, right, c.y, BLACK);
    c.y += 8.0;
    let total = TextStyle::bold(12.0);
    c.text(LABOR_X, c.y, "TOTAL:", &total);
    c.text(TOTAL_X, c.y, &format_currency(fields.total), &total);

    if let Some(notes) = fields.notes.filter(|n| !n.trim().is_empty()) {
        c.y += 15.0;
        c.ensure_space(0.0);
        c.text(LEFT, c.y, "NOTES:", &label);
        c.y += 6.0;
        let width = c.geometry.width - 2.0 * LEFT;
        for line in c.wrap(notes, &TextStyle::regular(10.0), width) {
            c.ensure_space(0.0);
            c.text(LEFT, c.y, &line, &body);
            c.y += 5.0;
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Invoice, InvoiceStatus};
    use crate::pdf::canvas::DrawOp;

    fn invoice_doc(items: usize) -> InvoiceDocument {
        InvoiceDocument {
            invoice: Invoice {
                id: "i1".to_string(),
                invoice_number: "INV-0003".to_string(),
                customer_id: "c1".to_string(),
                invoice_date: "2024-02-01".to_string(),
                due_date: None,
                work_completed_date: None,
                tech_name: "Sam".to_string(),
                notes: Some("Thanks!".to_string()),
                status: InvoiceStatus::Sent,
                total_amount: 15.0 * items as f64,
                amount_paid: 0.0,
                amount_due: 15.0 * items as f64,
                created_at: None,
                updated_at: None,
                customers: Some(CustomerSummary {
                    name: "Ada".to_string(),
                    address: Some("1 Main St".to_string()),
                    ..Default::default()
                }),
            },
            items: (0..items)
                .map(|i| LineItem {
                    id: format!("li{i}"),
                    description: format!("Item {i}"),
                    material_cost: 10.0,
                    labor_cost: 5.0,
                    total_cost: 15.0,
                    sort_order: i as i64,
                })
                .collect(),
            payments: Vec::new(),
        }
    }

    fn first_text_y(page: &crate::pdf::canvas::Page) -> Option<f32> {
        page.ops.iter().find_map(|op| match op {
            DrawOp::Text { y, .. } => Some(*y),
            _ => None,
        })
    }

    #[test]
    fn short_preview_is_a_single_page() {
        let c = layout_invoice_preview(&invoice_doc(3));
        assert_eq!(c.page_count(), 1);
        let texts: Vec<&str> = c.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        for expected in ["INVOICE", "Invoice #: INV-0003", "Invoice Date: 2/1/2024", "BILL TO:", "1 Main St", "TOTAL:", "$45.00", "NOTES:", "Thanks!"] {
            assert!(texts.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn rows_past_the_bottom_continue_at_the_top() {
        let c = layout_invoice_preview(&invoice_doc(40));
        assert!(c.page_count() > 1);
        for page in &c.pages[1..] {
            assert_eq!(first_text_y(page), Some(TOP));
        }
        for page in &c.pages {
            for op in &page.ops {
                if let DrawOp::Text { y, .. } = op {
                    assert!(*y <= c.geometry.height, "text below the page at {y}");
                }
            }
        }
    }
}
