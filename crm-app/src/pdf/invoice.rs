use super::branded::{self, Band, MARGIN, ROW_BORDER};
use super::canvas::{Canvas, TextStyle};
use crate::config::CompanyProfile;
use crate::format::{format_currency, format_date};
use crate::invoices::InvoiceDocument;

fn or_dash(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => format_date(v),
        None => "-".to_string(),
    }
}

fn payment_history(c: &mut Canvas, doc: &InvoiceDocument) {
    if doc.payments.is_empty() {
        return;
    }
    c.ensure_space(120.0);
    branded::section_band(c, "PAYMENT HISTORY");
    c.y += 24.0;

    let head = TextStyle::bold(9.0);
    c.text(MARGIN + 10.0, c.y, "DATE", &head);
    c.text(MARGIN + 120.0, c.y, "AMOUNT", &head);
    c.text(MARGIN + 200.0, c.y, "METHOD", &head);
    c.text(MARGIN + 300.0, c.y, "REFERENCE", &head);
    c.y += 6.0;
    let right = c.geometry.width - MARGIN;
    c.line(MARGIN, c.y, right, c.y, ROW_BORDER);
    c.y += 12.0;

    let body = TextStyle::regular(9.0);
    for payment in &doc.payments {
        c.ensure_space(30.0);
        let reference = payment
            .reference_number
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("-");
        c.text(MARGIN + 10.0, c.y, &format_date(&payment.payment_date), &body);
        c.text(MARGIN + 120.0, c.y, &format_currency(payment.amount), &body);
        c.text(MARGIN + 200.0, c.y, &payment.payment_method.as_str().to_uppercase(), &body);
        c.text(MARGIN + 300.0, c.y, reference, &body);
        c.y += 16.0;
    }
    c.y += 10.0;
}

/// The branded invoice: header, parties, items, totals, payment history,
/// scope of work and signature footer.
pub fn layout_invoice(doc: &InvoiceDocument, company: &CompanyProfile, has_logo: bool) -> Canvas {
    let invoice = &doc.invoice;
    let mut c = branded::new_canvas();

    branded::header(
        &mut c,
        company,
        has_logo,
        "INVOICE",
        &[
            Band::blue("INVOICE #", invoice.invoice_number.clone()),
            Band::gray("DATE", format_date(&invoice.invoice_date)),
            Band { bold_value: false, ..Band::blue("DUE DATE", or_dash(invoice.due_date.as_deref())) },
        ],
    );

    let tech = invoice.tech_name.trim();
    branded::party_boxes(
        &mut c,
        invoice.customers.as_ref(),
        &[
            format!("Technician: {}", if tech.is_empty() { "-" } else { tech }),
            format!("Work Completed: {}", or_dash(invoice.work_completed_date.as_deref())),
        ],
    );

    branded::items_table(&mut c, &doc.items);

    branded::totals_box(
        &mut c,
        &[
            Band::blue("TOTAL", format_currency(invoice.total_amount)),
            Band::gray("PAID", format_currency(invoice.amount_paid)),
            Band::blue("BALANCE DUE", format_currency(invoice.amount_due)),
        ],
    );

    payment_history(&mut c, doc);
    branded::text_block(&mut c, "SCOPE OF WORK", invoice.notes.as_deref());
    branded::signature_footer(&mut c, company, "invoice");
    c
}
