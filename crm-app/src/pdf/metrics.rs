//! Advance widths of the built-in Helvetica faces (1/1000 em, WinAnsi
//! printable ASCII) and width-based line wrapping.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const FALLBACK_WIDTH: u16 = 556;

fn char_width(ch: char, weight: FontWeight) -> u16 {
    let table = match weight {
        FontWeight::Regular => &HELVETICA,
        FontWeight::Bold => &HELVETICA_BOLD,
    };
    let code = ch as u32;
    if (32..=126).contains(&code) {
        table[(code - 32) as usize]
    } else {
        FALLBACK_WIDTH
    }
}

/// Width of `text` in points at `size_pt`.
pub fn text_width_pt(text: &str, weight: FontWeight, size_pt: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c, weight))).sum();
    units as f32 / 1000.0 * size_pt
}

fn split_long_word(word: &str, weight: FontWeight, size_pt: f32, max_width_pt: f32, out: &mut Vec<String>) -> String {
    let mut chunk = String::new();
    for ch in word.chars() {
        let mut candidate = chunk.clone();
        candidate.push(ch);
        if text_width_pt(&candidate, weight, size_pt) <= max_width_pt || chunk.is_empty() {
            chunk = candidate;
        } else {
            out.push(std::mem::replace(&mut chunk, ch.to_string()));
        }
    }
    chunk
}

fn wrap_paragraph(paragraph: &str, weight: FontWeight, size_pt: f32, max_width_pt: f32, out: &mut Vec<String>) {
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current = if text_width_pt(word, weight, size_pt) <= max_width_pt {
                word.to_string()
            } else {
                split_long_word(word, weight, size_pt, max_width_pt, out)
            };
            continue;
        }

        let candidate = format!("{current} {word}");
        if text_width_pt(&candidate, weight, size_pt) <= max_width_pt {
            current = candidate;
        } else {
            out.push(std::mem::take(&mut current));
            current = if text_width_pt(word, weight, size_pt) <= max_width_pt {
                word.to_string()
            } else {
                split_long_word(word, weight, size_pt, max_width_pt, out)
            };
        }
    }
    out.push(current);
}

/// Greedy word wrap to `max_width_pt`. Explicit newlines start a new line;
/// words wider than the column are split by character. Blank input yields
/// no lines.
pub fn wrap_text(input: &str, weight: FontWeight, size_pt: f32, max_width_pt: f32) -> Vec<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for paragraph in trimmed.lines() {
        wrap_paragraph(paragraph, weight, size_pt, max_width_pt, &mut out);
    }
    out
}
