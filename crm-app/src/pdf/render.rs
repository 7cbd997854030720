//! Turns a laid-out [`Canvas`] into PDF bytes with printpdf.

use std::io::BufWriter;

use printpdf::image_crate::{DynamicImage, GenericImageView};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect,
};

use super::canvas::{Canvas, DrawOp, PageGeometry, Rgb};
use super::metrics::FontWeight;
use crate::error::{Error, Result};

const LOGO_DPI: f32 = 300.0;
const STROKE_WIDTH: f32 = 0.75;

/// Maps top-left layout coordinates onto printpdf's bottom-left millimetres.
#[derive(Debug, Clone, Copy)]
struct Frame {
    geometry: PageGeometry,
}

impl Frame {
    fn mm(&self, v: f32) -> f32 {
        v * self.geometry.unit_pt * 25.4 / 72.0
    }

    fn x(&self, x: f32) -> Mm {
        Mm(self.mm(x))
    }

    fn y(&self, y: f32) -> Mm {
        Mm(self.mm(self.geometry.height - y))
    }

    fn page_size(&self) -> (Mm, Mm) {
        (Mm(self.mm(self.geometry.width)), Mm(self.mm(self.geometry.height)))
    }
}

fn pdf_color(c: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        f32::from(c.0) / 255.0,
        f32::from(c.1) / 255.0,
        f32::from(c.2) / 255.0,
        None,
    ))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn get(&self, weight: FontWeight) -> &IndirectFontRef {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

fn rect(frame: &Frame, x: f32, y: f32, w: f32, h: f32, mode: PaintMode) -> Rect {
    Rect::new(frame.x(x), frame.y(y + h), frame.x(x + w), frame.y(y)).with_mode(mode)
}

/// Fits the image into the box keeping its aspect ratio, anchored top-left.
fn draw_logo(layer: &PdfLayerReference, frame: &Frame, image: &DynamicImage, x: f32, y: f32, w: f32, h: f32) {
    let (px_w, px_h) = image.dimensions();
    let natural_w_mm = px_w.max(1) as f32 / LOGO_DPI * 25.4;
    let natural_h_mm = px_h.max(1) as f32 / LOGO_DPI * 25.4;
    let scale = (frame.mm(w) / natural_w_mm).min(frame.mm(h) / natural_h_mm).max(0.01);
    let bottom = frame.mm(frame.geometry.height - y) - natural_h_mm * scale;

    Image::from_dynamic_image(image).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(frame.x(x)),
            translate_y: Some(Mm(bottom)),
            rotate: None,
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(LOGO_DPI),
        },
    );
}

fn draw_op(layer: &PdfLayerReference, frame: &Frame, fonts: &Fonts, logo: Option<&DynamicImage>, op: &DrawOp) {
    match op {
        DrawOp::Text { x, y, text, size, weight, color } => {
            layer.set_fill_color(pdf_color(*color));
            layer.use_text(text.as_str(), *size, frame.x(*x), frame.y(*y), fonts.get(*weight));
        }
        DrawOp::FillRect { x, y, w, h, color } => {
            layer.set_fill_color(pdf_color(*color));
            layer.add_rect(rect(frame, *x, *y, *w, *h, PaintMode::Fill));
        }
        DrawOp::StrokeRect { x, y, w, h, color } => {
            layer.set_outline_color(pdf_color(*color));
            layer.add_rect(rect(frame, *x, *y, *w, *h, PaintMode::Stroke));
        }
        DrawOp::Line { x1, y1, x2, y2, color } => {
            layer.set_outline_color(pdf_color(*color));
            layer.add_line(Line {
                points: vec![
                    (Point::new(frame.x(*x1), frame.y(*y1)), false),
                    (Point::new(frame.x(*x2), frame.y(*y2)), false),
                ],
                is_closed: false,
            });
        }
        DrawOp::Logo { x, y, w, h } => {
            if let Some(image) = logo {
                draw_logo(layer, frame, image, *x, *y, *w, *h);
            }
        }
    }
}

pub fn render(title: &str, canvas: &Canvas, logo: Option<&DynamicImage>) -> Result<Vec<u8>> {
    let frame = Frame { geometry: canvas.geometry };
    let (width, height) = frame.page_size();

    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
    };

    for (index, page) in canvas.pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, format!("Layer {}", index + 1))
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        layer.set_outline_thickness(STROKE_WIDTH);
        for op in &page.ops {
            draw_op(&layer, &frame, &fonts, logo, op);
        }
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)?;
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}
