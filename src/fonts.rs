//! Font loading, text measurement and word wrapping using `ttf-parser`.
//!
//! With no font loaded every measurement comes from a fixed per-character
//! width table, so layouts stay reproducible on machines without the
//! résumé's fonts. Loaded faces supply real advances, ascenders and glyph
//! outlines for the rasterizer.

use std::collections::HashMap;
use std::sync::Arc;

use ttf_parser::{Face, FaceParsingError};

/// Weight/slant selector. The résumé uses a single family.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub const REGULAR: Self = Self {
        bold: false,
        italic: false,
    };
}

/// A parsed face's metrics plus the bytes needed to re-open it.
#[derive(Clone)]
pub struct FontData {
    bytes: Arc<[u8]>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

impl FontData {
    pub fn parse(bytes: Vec<u8>) -> Result<Self, FaceParsingError> {
        let face = Face::parse(&bytes, 0)?;
        let units_per_em = face.units_per_em() as f32;
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;
        Ok(Self {
            bytes: bytes.into(),
            units_per_em,
            ascender,
            descender,
        })
    }

    /// Run `f` against the parsed face. Parsing is cheap; it only validates
    /// table offsets.
    pub fn with_face<R>(&self, f: impl FnOnce(&Face<'_>) -> R) -> Option<R> {
        Face::parse(&self.bytes, 0).ok().map(|face| f(&face))
    }

    pub fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em
    }
}

/// Registry of loaded faces, shared between layout and rasterization.
#[derive(Clone, Default)]
pub struct FontManager {
    faces: HashMap<FontKey, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF face for the given weight/slant.
    pub fn load_font(&mut self, key: FontKey, bytes: Vec<u8>) -> Result<(), FaceParsingError> {
        let data = FontData::parse(bytes)?;
        log::debug!(
            "loaded font face bold={} italic={} ({} units/em)",
            key.bold,
            key.italic,
            data.units_per_em
        );
        self.faces.insert(key, data);
        Ok(())
    }

    pub fn has_real_fonts(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Best face for `key`: exact match, then upright of the same weight,
    /// then regular.
    pub fn face(&self, key: FontKey) -> Option<&FontData> {
        self.faces
            .get(&key)
            .or_else(|| {
                self.faces.get(&FontKey {
                    italic: false,
                    ..key
                })
            })
            .or_else(|| self.faces.get(&FontKey::REGULAR))
    }

    /// Width of `text` in px.
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: FontKey) -> f32 {
        if let Some(data) = self.face(key) {
            let scale = data.scale(font_size);
            let measured = data.with_face(|face| {
                text.chars()
                    .map(|ch| {
                        face.glyph_index(ch)
                            .and_then(|gid| face.glyph_hor_advance(gid))
                            .map_or(font_size * 0.5, |adv| adv as f32 * scale)
                    })
                    .sum::<f32>()
            });
            if let Some(w) = measured {
                return w;
            }
        }
        let bold_factor = if key.bold { 1.08 } else { 1.0 };
        text.chars()
            .map(|c| heuristic_advance(c) * font_size * bold_factor)
            .sum()
    }

    /// Distance from the top of a line box to the baseline, in px.
    pub fn baseline_offset(&self, font_size: f32, line_height_px: f32, key: FontKey) -> f32 {
        let (ascent, descent) = match self.face(key) {
            Some(d) => {
                let s = d.scale(font_size);
                (d.ascender * s, -d.descender * s)
            }
            None => (font_size * 0.8, font_size * 0.2),
        };
        // Half-leading above the ascent, as in CSS inline layout.
        (line_height_px - (ascent + descent)) / 2.0 + ascent
    }

    /// Greedy word wrap to `max_width` px. Hard breaks (`\n`) are honoured.
    pub fn wrap_text(&self, text: &str, font_size: f32, key: FontKey, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate = format!("{current} {word}");
                if max_width > 0.0 && self.measure_text_width(&candidate, font_size, key) > max_width
                {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            if !current.is_empty() {
                lines.push(current);
            }
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }
}

/// Approximate advance (in em) of a proportional sans-serif glyph.
fn heuristic_advance(c: char) -> f32 {
    match c {
        ' ' | 'i' | 'l' | 'j' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.28,
        'f' | 't' | 'r' | '(' | ')' | '-' | '/' => 0.36,
        'm' | 'w' | 'M' | 'W' | '@' => 0.82,
        c if c.is_ascii_uppercase() || c.is_ascii_digit() => 0.62,
        _ => 0.52,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_width_is_deterministic() {
        let fonts = FontManager::new();
        let w = fonts.measure_text_width("Hello", 10.0, FontKey::REGULAR);
        // H 0.62 + e 0.52 + l 0.28 + l 0.28 + o 0.52 = 2.22em
        assert!((w - 22.2).abs() < 1e-3, "got {w}");
        let bold = fonts.measure_text_width(
            "Hello",
            10.0,
            FontKey {
                bold: true,
                italic: false,
            },
        );
        assert!(bold > w);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let fonts = FontManager::new();
        let lines = fonts.wrap_text("alpha beta gamma delta", 16.0, FontKey::REGULAR, 100.0);
        assert!(lines.len() >= 2, "expected wrapping, got {lines:?}");
        assert_eq!(lines.join(" "), "alpha beta gamma delta");
    }

    #[test]
    fn overlong_word_stays_on_its_own_line() {
        let fonts = FontManager::new();
        let lines = fonts.wrap_text("a supercalifragilistic b", 16.0, FontKey::REGULAR, 40.0);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn empty_text_yields_one_empty_line() {
        let fonts = FontManager::new();
        assert_eq!(fonts.wrap_text("  ", 16.0, FontKey::REGULAR, 100.0), vec![""]);
    }

    #[test]
    fn baseline_sits_inside_line_box() {
        let fonts = FontManager::new();
        let b = fonts.baseline_offset(16.0, 24.0, FontKey::REGULAR);
        // (24 - 16) / 2 + 12.8
        assert!((b - 16.8).abs() < 1e-3, "got {b}");
    }

    #[test]
    fn rejects_garbage_font_bytes() {
        let mut fonts = FontManager::new();
        assert!(fonts.load_font(FontKey::REGULAR, vec![0u8; 12]).is_err());
        assert!(!fonts.has_real_fonts());
    }
}
