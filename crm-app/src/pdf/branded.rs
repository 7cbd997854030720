//! Building blocks of the branded US Letter layout shared by invoices and
//! estimates. All measurements are points.

use super::canvas::{Align, Canvas, Rgb, TextStyle, BLACK, LETTER_PT, WHITE};
use crate::config::CompanyProfile;
use crate::format::format_currency;
use crate::model::{CustomerSummary, LineItem};

pub const MARGIN: f32 = 40.0;
pub const BOTTOM_RESERVE: f32 = 140.0;
pub const BLUE: Rgb = Rgb(30, 80, 160);
pub const LIGHT_GRAY: Rgb = Rgb(240, 240, 240);
const BOX_BORDER: Rgb = Rgb(180, 180, 180);
pub const ROW_BORDER: Rgb = Rgb(200, 200, 200);

pub const LOGO_W: f32 = 210.0;
pub const LOGO_H: f32 = 55.0;
const TITLE_BOX_W: f32 = 220.0;
const BAND_H: f32 = 18.0;
const PARTY_BOX_H: f32 = 110.0;
const PARTY_GAP: f32 = 12.0;
const ROW_LINE_HEIGHT: f32 = 14.0;
const TOTALS_W: f32 = 200.0;
const TOTALS_ROW_H: f32 = 22.0;
const TOTALS_BOX_H: f32 = 88.0;

pub fn new_canvas() -> Canvas {
    Canvas::new(LETTER_PT, MARGIN, BOTTOM_RESERVE)
}

pub fn content_width(c: &Canvas) -> f32 {
    c.geometry.width - 2.0 * MARGIN
}

/// A labelled band in the title box or totals box.
pub struct Band<'a> {
    pub label: &'a str,
    pub value: String,
    pub fill: Rgb,
    pub bold_value: bool,
}

impl<'a> Band<'a> {
    pub fn blue(label: &'a str, value: String) -> Self {
        Band { label, value, fill: BLUE, bold_value: true }
    }

    pub fn gray(label: &'a str, value: String) -> Self {
        Band { label, value, fill: LIGHT_GRAY, bold_value: false }
    }

    fn text_color(&self) -> Rgb {
        if self.fill == BLUE {
            WHITE
        } else {
            BLACK
        }
    }
}

/// Logo or company name, contact lines, and the title box on the right.
/// Leaves the cursor below the contact lines.
pub fn header(c: &mut Canvas, company: &CompanyProfile, has_logo: bool, title: &str, bands: &[Band<'_>]) {
    let y = c.y;

    if has_logo {
        c.logo(MARGIN, y - 8.0, LOGO_W, LOGO_H);
    } else {
        c.text(MARGIN, y + 20.0, &company.name, &TextStyle::bold(18.0));
    }

    let contact = TextStyle::regular(9.0);
    let info_y = y + 60.0;
    let contact_lines = [
        company.phone.as_deref().map(|v| format!("Phone: {v}")),
        company.email.as_deref().map(|v| format!("Email: {v}")),
        company.website.as_deref().map(|v| format!("Website: {v}")),
    ];
    for (i, line) in contact_lines.iter().flatten().enumerate() {
        c.text(MARGIN, info_y + 12.0 * i as f32, line, &contact);
    }

    let box_x = c.geometry.width - MARGIN - TITLE_BOX_W;
    c.text(box_x + TITLE_BOX_W / 2.0, y + 18.0, title, &TextStyle::bold(16.0).align(Align::Center));

    let mut band_y = y + 26.0;
    for band in bands {
        let color = band.text_color();
        c.fill_rect(box_x, band_y, TITLE_BOX_W, BAND_H, band.fill);
        c.text(box_x + 10.0, band_y + 13.0, band.label, &TextStyle::bold(10.0).color(color));
        let value_style = if band.bold_value { TextStyle::bold(10.0) } else { TextStyle::regular(10.0) };
        c.text(
            box_x + TITLE_BOX_W - 10.0,
            band_y + 13.0,
            &band.value,
            &value_style.color(color).align(Align::Right),
        );
        band_y += BAND_H;
    }

    c.y = info_y + 45.0;
}

fn boxed_section(c: &mut Canvas, x: f32, w: f32, title: &str) {
    c.stroke_rect(x, c.y, w, PARTY_BOX_H, BOX_BORDER);
    c.fill_rect(x, c.y, w, BAND_H, BLUE);
    c.text(x + 10.0, c.y + 13.0, title, &TextStyle::bold(10.0).color(WHITE));
}

/// "BILL TO" and "JOB DETAILS" side by side.
pub fn party_boxes(c: &mut Canvas, customer: Option<&CustomerSummary>, job_lines: &[String]) {
    let box_w = (content_width(c) - PARTY_GAP) / 2.0;
    let bill_x = MARGIN;
    let job_x = MARGIN + box_w + PARTY_GAP;
    let y = c.y;
    let body = TextStyle::regular(9.0);

    boxed_section(c, bill_x, box_w, "BILL TO");
    if let Some(customer) = customer {
        let mut by = y + BAND_H + 16.0;
        c.text(bill_x + 10.0, by, &customer.name, &body);
        by += 12.0;
        if let Some(address) = customer.address.as_deref() {
            for line in c.wrap(address, &body, box_w - 20.0) {
                c.text(bill_x + 10.0, by, &line, &body);
                by += 12.0;
            }
        }
        if let Some(email) = customer.email.as_deref() {
            c.text(bill_x + 10.0, y + PARTY_BOX_H - 28.0, email, &body);
        }
        if let Some(phone) = customer.phone.as_deref() {
            c.text(bill_x + 10.0, y + PARTY_BOX_H - 14.0, phone, &body);
        }
    }

    boxed_section(c, job_x, box_w, "JOB DETAILS");
    for (i, line) in job_lines.iter().enumerate() {
        c.text(job_x + 10.0, y + BAND_H + 18.0 + 16.0 * i as f32, line, &body);
    }

    c.y = y + PARTY_BOX_H + 14.0;
}

/// QTY / DESCRIPTION / MATERIAL / LABOR / TOTAL with wrapped descriptions.
/// Every row first makes room for its wrapped height.
pub fn items_table(c: &mut Canvas, items: &[LineItem]) {
    let table_x = MARGIN;
    let table_w = content_width(c);
    let qty_x = table_x + 10.0;
    let desc_x = table_x + 55.0;
    let material_x = table_x + table_w - 170.0;
    let labor_x = table_x + table_w - 115.0;
    let total_x = table_x + table_w - 55.0;

    let head = TextStyle::bold(9.0).color(WHITE);
    c.fill_rect(table_x, c.y, table_w, BAND_H, BLUE);
    let head_y = c.y + 13.0;
    c.text(qty_x, head_y, "QTY", &head);
    c.text(desc_x, head_y, "DESCRIPTION", &head);
    c.text(material_x, head_y, "MATERIAL", &head.align(Align::Right));
    c.text(labor_x, head_y, "LABOR", &head.align(Align::Right));
    c.text(total_x, head_y, "TOTAL", &head.align(Align::Right));
    c.y += 24.0;

    let body = TextStyle::regular(9.0);
    let money = body.align(Align::Right);
    for item in items {
        let total = if item.total_cost != 0.0 { item.total_cost } else { item.material_cost + item.labor_cost };
        let lines = c.wrap(&item.description, &body, (material_x - 10.0) - desc_x);
        let row_h = (lines.len() as f32 * ROW_LINE_HEIGHT).max(ROW_LINE_HEIGHT) + 10.0;
        c.ensure_space(row_h.max(50.0));
        let y = c.y;

        c.stroke_rect(table_x, y - 10.0, table_w, row_h, ROW_BORDER);
        c.text(qty_x, y, "1", &body);
        for (i, line) in lines.iter().enumerate() {
            c.text(desc_x, y + i as f32 * ROW_LINE_HEIGHT, line, &body);
        }
        c.text(material_x, y, &format_currency(item.material_cost), &money);
        c.text(labor_x, y, &format_currency(item.labor_cost), &money);
        c.text(total_x, y, &format_currency(total), &money);

        c.y += row_h;
    }
}

/// Right-aligned box of three bands.
pub fn totals_box(c: &mut Canvas, bands: &[Band<'_>]) {
    c.ensure_space(160.0);
    let table_w = content_width(c);
    let x = MARGIN + table_w - TOTALS_W;
    let y = c.y + 10.0;

    c.stroke_rect(x, y, TOTALS_W, TOTALS_BOX_H, BOX_BORDER);
    for (i, band) in bands.iter().enumerate() {
        let top = y + TOTALS_ROW_H * i as f32;
        let color = band.text_color();
        c.fill_rect(x, top, TOTALS_W, TOTALS_ROW_H, band.fill);
        c.text(x + 10.0, top + 15.0, band.label, &TextStyle::bold(10.0).color(color));
        let value_style = if band.bold_value { TextStyle::bold(10.0) } else { TextStyle::regular(10.0) };
        c.text(
            x + TOTALS_W - 10.0,
            top + 15.0,
            &band.value,
            &value_style.color(color).align(Align::Right),
        );
    }

    c.y = y + TOTALS_BOX_H + 20.0;
}

/// Full-width blue title band.
pub fn section_band(c: &mut Canvas, title: &str) {
    c.fill_rect(MARGIN, c.y, content_width(c), BAND_H, BLUE);
    c.text(MARGIN + 10.0, c.y + 13.0, title, &TextStyle::bold(10.0).color(WHITE));
}

/// Titled, bordered block of wrapped free text (an em dash when empty).
pub fn text_block(c: &mut Canvas, title: &str, text: Option<&str>) {
    c.ensure_space(120.0);
    let width = content_width(c);
    section_band(c, title);
    c.y += 28.0;

    let body = TextStyle::regular(9.0);
    let mut lines = c.wrap(text.unwrap_or_default(), &body, width - 20.0);
    if lines.is_empty() {
        lines.push("\u{2014}".to_string());
    }
    let box_h = (lines.len() as f32 * 12.0 + 20.0).max(70.0);
    c.stroke_rect(MARGIN, c.y - 10.0, width, box_h, BOX_BORDER);

    let mut sy = c.y + 10.0;
    for line in &lines {
        c.text(MARGIN + 10.0, sy, line, &body);
        sy += 12.0;
    }

    c.y = c.y - 10.0 + box_h + 20.0;
}

/// Reference note, contact line, and signature/date rules.
pub fn signature_footer(c: &mut Canvas, company: &CompanyProfile, document_word: &str) {
    c.ensure_space(120.0);
    let small = TextStyle::regular(8.0);

    c.text(
        MARGIN,
        c.y,
        &format!("Please reference this {document_word} number in all correspondence."),
        &small,
    );
    c.y += 12.0;

    let contact: Vec<&str> = [company.phone.as_deref(), company.email.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !contact.is_empty() {
        c.text(MARGIN, c.y, &format!("Questions? {}", contact.join(" | ")), &small);
    }
    c.y += 24.0;

    let right = c.geometry.width - MARGIN;
    let y = c.y;
    c.line(MARGIN, y, MARGIN + 260.0, y, BLACK);
    c.text(MARGIN, y + 12.0, "Signature", &small);
    c.line(right - 180.0, y, right, y, BLACK);
    c.text(right - 180.0, y + 12.0, "Date", &small);
}
