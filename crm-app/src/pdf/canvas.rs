//! Page display list with a single running vertical cursor.
//!
//! Coordinates are top-left origin, y growing downwards, in the units of the
//! page geometry (points for Letter, millimetres for A4). Text `y` is the
//! baseline.

use super::metrics::{text_width_pt, wrap_text, FontWeight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    /// Points per layout unit.
    pub unit_pt: f32,
}

pub const LETTER_PT: PageGeometry = PageGeometry { width: 612.0, height: 792.0, unit_pt: 1.0 };
pub const A4_MM: PageGeometry = PageGeometry { width: 210.0, height: 297.0, unit_pt: 72.0 / 25.4 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub weight: FontWeight,
    pub color: Rgb,
    pub align: Align,
}

impl TextStyle {
    pub fn regular(size: f32) -> Self {
        Self { size, weight: FontWeight::Regular, color: BLACK, align: Align::Left }
    }

    pub fn bold(size: f32) -> Self {
        Self { weight: FontWeight::Bold, ..Self::regular(size) }
    }

    pub fn color(self, color: Rgb) -> Self {
        Self { color, ..self }
    }

    pub fn align(self, align: Align) -> Self {
        Self { align, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `x` is the left edge after alignment.
    Text { x: f32, y: f32, text: String, size: f32, weight: FontWeight, color: Rgb },
    FillRect { x: f32, y: f32, w: f32, h: f32, color: Rgb },
    StrokeRect { x: f32, y: f32, w: f32, h: f32, color: Rgb },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb },
    /// The company logo, fitted into this box.
    Logo { x: f32, y: f32, w: f32, h: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone)]
pub struct Canvas {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
    /// Running cursor.
    pub y: f32,
    top: f32,
    bottom_reserve: f32,
}

impl Canvas {
    pub fn new(geometry: PageGeometry, top: f32, bottom_reserve: f32) -> Self {
        Self { geometry, pages: vec![Page::default()], y: top, top, bottom_reserve }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn add_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.top;
    }

    /// Starts a new page when `needed` more units would run into the bottom
    /// reserve. Returns whether a page was added.
    pub fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y + needed > self.geometry.height - self.bottom_reserve {
            self.add_page();
            true
        } else {
            false
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    pub fn text_width(&self, text: &str, style: &TextStyle) -> f32 {
        text_width_pt(text, style.weight, style.size) / self.geometry.unit_pt
    }

    pub fn wrap(&self, text: &str, style: &TextStyle, max_width: f32) -> Vec<String> {
        wrap_text(text, style.weight, style.size, max_width * self.geometry.unit_pt)
    }

    pub fn text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle) {
        if text.is_empty() {
            return;
        }
        let x = match style.align {
            Align::Left => x,
            Align::Center => x - self.text_width(text, style) / 2.0,
            Align::Right => x - self.text_width(text, style),
        };
        self.push(DrawOp::Text {
            x,
            y,
            text: text.to_string(),
            size: style.size,
            weight: style.weight,
            color: style.color,
        });
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.push(DrawOp::FillRect { x, y, w, h, color });
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.push(DrawOp::StrokeRect { x, y, w, h, color });
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb) {
        self.push(DrawOp::Line { x1, y1, x2, y2, color });
    }

    pub fn logo(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.push(DrawOp::Logo { x, y, w, h });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_break_resets_cursor_to_top() {
        let mut c = Canvas::new(LETTER_PT, 40.0, 140.0);
        c.y = 600.0;
        assert!(!c.ensure_space(50.0));
        assert_eq!(c.page_count(), 1);

        c.y = 620.0;
        assert!(c.ensure_space(50.0));
        assert_eq!(c.page_count(), 2);
        assert_eq!(c.y, 40.0);
    }

    #[test]
    fn ops_land_on_the_current_page() {
        let mut c = Canvas::new(A4_MM, 20.0, 27.0);
        c.line(20.0, 30.0, 190.0, 30.0, BLACK);
        c.add_page();
        c.text(20.0, 20.0, "next", &TextStyle::regular(10.0));
        c.text(20.0, 30.0, "", &TextStyle::regular(10.0));
        assert_eq!(c.pages[0].ops.len(), 1);
        assert_eq!(c.pages[1].ops.len(), 1);
    }

    #[test]
    fn alignment_moves_the_left_edge() {
        let mut c = Canvas::new(LETTER_PT, 40.0, 140.0);
        let style = TextStyle::bold(10.0);
        let width = c.text_width("$12.30", &style);
        c.text(300.0, 100.0, "$12.30", &style.align(Align::Right));
        c.text(300.0, 120.0, "$12.30", &style.align(Align::Center));
        match (&c.pages[0].ops[0], &c.pages[0].ops[1]) {
            (DrawOp::Text { x: right, .. }, DrawOp::Text { x: center, .. }) => {
                assert!((right - (300.0 - width)).abs() < 1e-3);
                assert!((center - (300.0 - width / 2.0)).abs() < 1e-3);
            }
            other => panic!("unexpected ops {other:?}"),
        }
    }

    #[test]
    fn millimetre_pages_measure_in_millimetres() {
        let c = Canvas::new(A4_MM, 20.0, 27.0);
        let pt = Canvas::new(LETTER_PT, 40.0, 140.0);
        let style = TextStyle::regular(10.0);
        let ratio = pt.text_width("Invoice", &style) / c.text_width("Invoice", &style);
        assert!((ratio - 72.0 / 25.4).abs() < 1e-3);
    }
}
