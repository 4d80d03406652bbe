//! Software rasterizer for display lists.
//!
//! Paints onto an `RgbaImage` at `scale` device pixels per logical pixel.
//! Shapes use pixel-centre sampling with a one-pixel soft edge on rounded
//! corners. Text is filled from `ttf-parser` glyph outlines when a face is
//! loaded and drawn as greeked word bars otherwise.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::display_list::{DisplayList, Fill, GradientAxis, LayoutRect, PaintItem, Rgba as Rgbaf, TextLine};
use crate::fonts::{FontKey, FontManager};

/// Vertical samples per pixel row when filling glyph outlines.
const SUBSAMPLES: usize = 4;
/// Segments used to flatten each quadratic/cubic curve.
const CURVE_STEPS: usize = 8;

pub struct Canvas {
    pixels: RgbaImage,
    scale: f32,
}

impl Canvas {
    pub fn new(width: u32, height: u32, scale: f32, background: [u8; 3]) -> Self {
        let [r, g, b] = background;
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])),
            scale,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Paint every item of `list` in order.
    pub fn paint(&mut self, list: &DisplayList, fonts: &FontManager) {
        for item in &list.items {
            match item {
                PaintItem::Rect { rect, fill, radius } => self.fill_rect(*rect, fill, *radius),
                PaintItem::Border {
                    rect,
                    widths,
                    color,
                } => self.stroke_border(*rect, *widths, *color),
                PaintItem::Text {
                    lines,
                    font_size,
                    bold,
                    italic,
                    underline,
                    color,
                } => {
                    let key = FontKey {
                        bold: *bold,
                        italic: *italic,
                    };
                    for line in lines {
                        self.draw_text_line(line, *font_size, key, *color, fonts);
                        if *underline {
                            let thickness = (font_size / 16.0).max(1.0 / self.scale);
                            let rect = LayoutRect::new(
                                line.x,
                                line.baseline + font_size * 0.1,
                                line.width,
                                thickness,
                            );
                            self.fill_rect(rect, &Fill::Solid(*color), 0.0);
                        }
                    }
                }
                PaintItem::Image { rect, pixels, .. } => {
                    if let Some(img) = pixels {
                        self.draw_image(*rect, img);
                    }
                }
            }
        }
    }

    /// Device-pixel span covering `[start, start + len)` logical px.
    fn span(&self, start: f32, len: f32, limit: u32) -> (u32, u32) {
        let a = (start * self.scale).round().clamp(0.0, limit as f32) as u32;
        let b = ((start + len) * self.scale).round().clamp(0.0, limit as f32) as u32;
        (a, b)
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgbaf, coverage: f32) {
        let alpha = (color[3] * coverage).clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let dst = self.pixels.get_pixel_mut(x, y);
        for c in 0..3 {
            let src = color[c].clamp(0.0, 1.0) * 255.0;
            let out = src * alpha + dst.0[c] as f32 * (1.0 - alpha);
            dst.0[c] = out.round() as u8;
        }
        let da = dst.0[3] as f32 / 255.0;
        dst.0[3] = ((alpha + da * (1.0 - alpha)) * 255.0).round() as u8;
    }

    pub fn fill_rect(&mut self, rect: LayoutRect, fill: &Fill, radius: f32) {
        if rect.is_empty() {
            return;
        }
        let (x0, x1) = self.span(rect.x, rect.width, self.pixels.width());
        let (y0, y1) = self.span(rect.y, rect.height, self.pixels.height());
        let s = self.scale;
        let r = (radius * s).min(rect.width * s / 2.0).min(rect.height * s / 2.0);
        let (left, top) = (rect.x * s, rect.y * s);
        let (right, bottom) = ((rect.x + rect.width) * s, (rect.y + rect.height) * s);

        for py in y0..y1 {
            for px in x0..x1 {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                let coverage = if r > 0.0 {
                    corner_coverage(cx, cy, left, top, right, bottom, r)
                } else {
                    1.0
                };
                if coverage <= 0.0 {
                    continue;
                }
                let color = match fill {
                    Fill::Solid(c) => *c,
                    Fill::LinearGradient {
                        direction,
                        from,
                        to,
                    } => {
                        let t = match direction {
                            GradientAxis::ToRight => (cx - left) / (right - left),
                            GradientAxis::ToLeft => (right - cx) / (right - left),
                            GradientAxis::ToBottom => (cy - top) / (bottom - top),
                            GradientAxis::ToTop => (bottom - cy) / (bottom - top),
                        };
                        lerp(*from, *to, t.clamp(0.0, 1.0))
                    }
                };
                self.blend(px, py, color, coverage);
            }
        }
    }

    fn stroke_border(&mut self, rect: LayoutRect, widths: [f32; 4], color: Rgbaf) {
        let [top, right, bottom, left] = widths;
        let fill = Fill::Solid(color);
        let LayoutRect {
            x,
            y,
            width,
            height,
        } = rect;
        self.fill_rect(LayoutRect::new(x, y, width, top), &fill, 0.0);
        self.fill_rect(LayoutRect::new(x, y + height - bottom, width, bottom), &fill, 0.0);
        let inner = (height - top - bottom).max(0.0);
        self.fill_rect(LayoutRect::new(x, y + top, left, inner), &fill, 0.0);
        self.fill_rect(LayoutRect::new(x + width - right, y + top, right, inner), &fill, 0.0);
    }

    /// Only the part of the box that lands on the canvas is resampled, so an
    /// oversized `<img>` costs no more than the canvas itself.
    fn draw_image(&mut self, rect: LayoutRect, img: &RgbaImage) {
        let s = self.scale;
        let left = (rect.x * s).round();
        let top = (rect.y * s).round();
        let full_w = ((rect.x + rect.width) * s).round() - left;
        let full_h = ((rect.y + rect.height) * s).round() - top;
        if full_w < 1.0 || full_h < 1.0 || img.width() == 0 || img.height() == 0 {
            return;
        }
        let (x0, x1) = self.span(rect.x, rect.width, self.pixels.width());
        let (y0, y1) = self.span(rect.y, rect.height, self.pixels.height());
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        // Source pixels per device pixel along each axis.
        let kx = img.width() as f32 / full_w;
        let ky = img.height() as f32 / full_h;
        let src_x0 = ((x0 as f32 - left) * kx).floor().max(0.0) as u32;
        let src_y0 = ((y0 as f32 - top) * ky).floor().max(0.0) as u32;
        let src_x1 = (((x1 as f32 - left) * kx).ceil() as u32)
            .max(src_x0 + 1)
            .min(img.width());
        let src_y1 = (((y1 as f32 - top) * ky).ceil() as u32)
            .max(src_y0 + 1)
            .min(img.height());
        if src_x1 <= src_x0 || src_y1 <= src_y0 {
            return;
        }

        let visible = imageops::crop_imm(img, src_x0, src_y0, src_x1 - src_x0, src_y1 - src_y0)
            .to_image();
        let resized = imageops::resize(&visible, x1 - x0, y1 - y0, FilterType::Triangle);
        imageops::overlay(&mut self.pixels, &resized, i64::from(x0), i64::from(y0));
    }

    fn draw_text_line(
        &mut self,
        line: &TextLine,
        font_size: f32,
        key: FontKey,
        color: Rgbaf,
        fonts: &FontManager,
    ) {
        if line.text.trim().is_empty() {
            return;
        }
        let Some(face) = fonts.face(key) else {
            self.draw_greeked(line, font_size, key, color, fonts);
            return;
        };
        let s = self.scale;
        let k = face.scale(font_size);
        let segments = face.with_face(|face| {
            let mut sink = OutlineSink::default();
            let mut pen = line.x;
            for ch in line.text.chars() {
                let Some(gid) = face.glyph_index(ch) else {
                    pen += font_size * 0.5;
                    continue;
                };
                sink.transform = GlyphTransform {
                    origin_x: pen * s,
                    origin_y: line.baseline * s,
                    scale: k * s,
                };
                face.outline_glyph(gid, &mut sink);
                pen += advance(face, gid) * k;
            }
            sink.segments
        });
        if let Some(segments) = segments {
            self.fill_segments(&segments, color);
        }
    }

    /// Draw each word as a bar spanning its x-height.
    fn draw_greeked(&mut self, line: &TextLine, font_size: f32, key: FontKey, color: Rgbaf, fonts: &FontManager) {
        let space = fonts.measure_text_width(" ", font_size, key);
        let mut pen = line.x;
        let bar = [color[0], color[1], color[2], color[3] * 0.8];
        for word in line.text.split(' ') {
            let w = fonts.measure_text_width(word, font_size, key);
            if w > 0.0 {
                let rect = LayoutRect::new(pen, line.baseline - font_size * 0.55, w, font_size * 0.5);
                self.fill_rect(rect, &Fill::Solid(bar), 0.0);
            }
            pen += w + space;
        }
    }

    /// Non-zero winding fill of closed line segments in device px.
    fn fill_segments(&mut self, segments: &[Segment], color: Rgbaf) {
        if segments.is_empty() {
            return;
        }
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for seg in segments {
            min_x = min_x.min(seg.x0.min(seg.x1));
            max_x = max_x.max(seg.x0.max(seg.x1));
            min_y = min_y.min(seg.y0.min(seg.y1));
            max_y = max_y.max(seg.y0.max(seg.y1));
        }
        let (w, h) = (self.pixels.width() as f32, self.pixels.height() as f32);
        let bx0 = min_x.floor().clamp(0.0, w) as u32;
        let bx1 = max_x.ceil().clamp(0.0, w) as u32;
        let by0 = min_y.floor().clamp(0.0, h) as u32;
        let by1 = max_y.ceil().clamp(0.0, h) as u32;
        if bx1 <= bx0 || by1 <= by0 {
            return;
        }

        let mut coverage = vec![0f32; (bx1 - bx0) as usize];
        let mut crossings: Vec<(f32, i32)> = Vec::new();
        for py in by0..by1 {
            coverage.iter_mut().for_each(|c| *c = 0.0);
            for sub in 0..SUBSAMPLES {
                let sy = py as f32 + (sub as f32 + 0.5) / SUBSAMPLES as f32;
                crossings.clear();
                for seg in segments {
                    if let Some(x) = seg.crossing(sy) {
                        crossings.push(x);
                    }
                }
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
                let mut winding = 0;
                for pair in crossings.windows(2) {
                    winding += pair[0].1;
                    if winding != 0 {
                        accumulate_span(&mut coverage, bx0 as f32, pair[0].0, pair[1].0);
                    }
                }
            }
            for (i, c) in coverage.iter().enumerate() {
                if *c > 0.0 {
                    self.blend(bx0 + i as u32, py, color, c.min(1.0));
                }
            }
        }
    }
}

fn accumulate_span(coverage: &mut [f32], origin: f32, xa: f32, xb: f32) {
    let weight = 1.0 / SUBSAMPLES as f32;
    let start = (xa - origin).max(0.0);
    let end = (xb - origin).min(coverage.len() as f32);
    if end <= start {
        return;
    }
    let first = start.floor() as usize;
    let last = (end.ceil() as usize).min(coverage.len());
    for (i, cell) in coverage.iter_mut().enumerate().take(last).skip(first) {
        let lo = start.max(i as f32);
        let hi = end.min(i as f32 + 1.0);
        if hi > lo {
            *cell += (hi - lo) * weight;
        }
    }
}

/// Fraction of the pixel at (`cx`, `cy`) inside a rounded rectangle.
fn corner_coverage(cx: f32, cy: f32, left: f32, top: f32, right: f32, bottom: f32, r: f32) -> f32 {
    let qx = if cx < left + r {
        left + r
    } else if cx > right - r {
        right - r
    } else {
        return 1.0;
    };
    let qy = if cy < top + r {
        top + r
    } else if cy > bottom - r {
        bottom - r
    } else {
        return 1.0;
    };
    let dist = ((cx - qx).powi(2) + (cy - qy).powi(2)).sqrt();
    (r - dist + 0.5).clamp(0.0, 1.0)
}

fn lerp(a: Rgbaf, b: Rgbaf, t: f32) -> Rgbaf {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

fn advance(face: &ttf_parser::Face<'_>, gid: GlyphId) -> f32 {
    face.glyph_hor_advance(gid).map_or(0.0, f32::from)
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl Segment {
    /// X position and winding direction where the segment crosses row `y`.
    fn crossing(&self, y: f32) -> Option<(f32, i32)> {
        let (dir, lo, hi) = if self.y1 > self.y0 {
            (1, self.y0, self.y1)
        } else if self.y1 < self.y0 {
            (-1, self.y1, self.y0)
        } else {
            return None;
        };
        if y < lo || y >= hi {
            return None;
        }
        let t = (y - self.y0) / (self.y1 - self.y0);
        Some((self.x0 + t * (self.x1 - self.x0), dir))
    }
}

/// Font units to device px; font y grows upward.
#[derive(Debug, Clone, Copy, Default)]
struct GlyphTransform {
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphTransform {
    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

#[derive(Default)]
struct OutlineSink {
    transform: GlyphTransform,
    segments: Vec<Segment>,
    start: (f32, f32),
    cursor: (f32, f32),
}

impl OutlineSink {
    fn push_line(&mut self, to: (f32, f32)) {
        let (x0, y0) = self.cursor;
        self.segments.push(Segment {
            x0,
            y0,
            x1: to.0,
            y1: to.1,
        });
        self.cursor = to;
    }
}

impl OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.transform.apply(x, y);
        self.start = p;
        self.cursor = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.transform.apply(x, y);
        self.push_line(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.cursor;
        let c = self.transform.apply(x1, y1);
        let p = self.transform.apply(x, y);
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let mt = 1.0 - t;
            let qx = mt * mt * p0.0 + 2.0 * mt * t * c.0 + t * t * p.0;
            let qy = mt * mt * p0.1 + 2.0 * mt * t * c.1 + t * t * p.1;
            self.push_line((qx, qy));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.cursor;
        let c1 = self.transform.apply(x1, y1);
        let c2 = self.transform.apply(x2, y2);
        let p = self.transform.apply(x, y);
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let mt = 1.0 - t;
            let a = mt * mt * mt;
            let b = 3.0 * mt * mt * t;
            let c = 3.0 * mt * t * t;
            let d = t * t * t;
            let cx = a * p0.0 + b * c1.0 + c * c2.0 + d * p.0;
            let cy = a * p0.1 + b * c1.1 + c * c2.1 + d * p.1;
            self.push_line((cx, cy));
        }
    }

    fn close(&mut self) {
        if self.cursor != self.start {
            self.push_line(self.start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(c: &Canvas, x: u32, y: u32) -> [u8; 4] {
        c.pixels.get_pixel(x, y).0
    }

    #[test]
    fn solid_rect_is_scaled() {
        let mut c = Canvas::new(30, 30, 1.5, [255, 255, 255]);
        c.fill_rect(
            LayoutRect::new(0.0, 0.0, 10.0, 10.0),
            &Fill::Solid([0.0, 0.0, 0.0, 1.0]),
            0.0,
        );
        assert_eq!(px(&c, 14, 14), [0, 0, 0, 255]);
        assert_eq!(px(&c, 15, 15), [255, 255, 255, 255]);
    }

    #[test]
    fn translucent_fill_blends_over_background() {
        let mut c = Canvas::new(4, 4, 1.0, [255, 255, 255]);
        c.fill_rect(
            LayoutRect::new(0.0, 0.0, 4.0, 4.0),
            &Fill::Solid([0.0, 0.0, 0.0, 0.5]),
            0.0,
        );
        let [r, g, b, a] = px(&c, 1, 1);
        assert_eq!((r, g, b, a), (128, 128, 128, 255));
    }

    #[test]
    fn rounded_corners_leave_corner_pixel_untouched() {
        let mut c = Canvas::new(40, 40, 1.0, [255, 255, 255]);
        c.fill_rect(
            LayoutRect::new(0.0, 0.0, 40.0, 40.0),
            &Fill::Solid([0.0, 0.0, 1.0, 1.0]),
            12.0,
        );
        assert_eq!(px(&c, 0, 0), [255, 255, 255, 255]);
        assert_eq!(px(&c, 20, 20), [0, 0, 255, 255]);
    }

    #[test]
    fn gradient_runs_from_start_to_end_colour() {
        let mut c = Canvas::new(100, 1, 1.0, [255, 255, 255]);
        c.fill_rect(
            LayoutRect::new(0.0, 0.0, 100.0, 1.0),
            &Fill::LinearGradient {
                direction: GradientAxis::ToRight,
                from: [1.0, 0.0, 0.0, 1.0],
                to: [0.0, 0.0, 1.0, 1.0],
            },
            0.0,
        );
        let left = px(&c, 0, 0);
        let right = px(&c, 99, 0);
        assert!(left[0] > 250 && left[2] < 5);
        assert!(right[2] > 250 && right[0] < 5);
    }

    #[test]
    fn border_paints_only_the_edges() {
        let mut c = Canvas::new(20, 20, 1.0, [255, 255, 255]);
        c.stroke_border(
            LayoutRect::new(0.0, 0.0, 20.0, 20.0),
            [2.0, 2.0, 2.0, 2.0],
            [0.0, 0.0, 0.0, 1.0],
        );
        assert_eq!(px(&c, 0, 10), [0, 0, 0, 255]);
        assert_eq!(px(&c, 19, 10), [0, 0, 0, 255]);
        assert_eq!(px(&c, 10, 10), [255, 255, 255, 255]);
    }

    #[test]
    fn image_is_resized_into_its_box() {
        let mut c = Canvas::new(30, 30, 1.5, [255, 255, 255]);
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
        c.draw_image(LayoutRect::new(0.0, 0.0, 10.0, 10.0), &img);
        assert_eq!(px(&c, 7, 7), [0, 255, 0, 255]);
        assert_eq!(px(&c, 20, 20), [255, 255, 255, 255]);
    }

    #[test]
    fn oversized_image_is_clipped_to_the_canvas() {
        let red = Rgba([255, 0, 0, 255]);
        let blue = Rgba([0, 0, 255, 255]);
        let img = RgbaImage::from_fn(4, 1, |x, _| if x < 2 { red } else { blue });

        // 100000px wide: only the leftmost sliver of the source is visible.
        let mut c = Canvas::new(20, 20, 1.0, [255, 255, 255]);
        c.draw_image(LayoutRect::new(0.0, 0.0, 100_000.0, 10.0), &img);
        assert_eq!(px(&c, 0, 5), red.0);
        assert_eq!(px(&c, 19, 5), red.0);
        assert_eq!(px(&c, 5, 15), [255, 255, 255, 255]);

        // Half the box hangs off the left edge; its right half shows.
        let mut c = Canvas::new(20, 20, 1.0, [255, 255, 255]);
        c.draw_image(LayoutRect::new(-10.0, 0.0, 20.0, 10.0), &img);
        let [r, _, b, _] = px(&c, 5, 5);
        assert!(b > 200 && r < 60, "{:?}", px(&c, 5, 5));
        assert_eq!(px(&c, 15, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn greeked_text_marks_the_line() {
        let mut c = Canvas::new(200, 40, 1.0, [255, 255, 255]);
        let line = TextLine {
            text: "Hello world".to_string(),
            x: 0.0,
            baseline: 20.0,
            width: 100.0,
        };
        c.draw_text_line(&line, 16.0, FontKey::REGULAR, [0.0, 0.0, 0.0, 1.0], &FontManager::new());
        assert_ne!(px(&c, 5, 15), [255, 255, 255, 255]);
        assert_eq!(px(&c, 5, 35), [255, 255, 255, 255]);
    }

    #[test]
    fn winding_fill_covers_a_square() {
        let mut c = Canvas::new(10, 10, 1.0, [255, 255, 255]);
        let pts = [(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0)];
        let segments: Vec<Segment> = (0..4)
            .map(|i| {
                let (x0, y0) = pts[i];
                let (x1, y1) = pts[(i + 1) % 4];
                Segment { x0, y0, x1, y1 }
            })
            .collect();
        c.fill_segments(&segments, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(px(&c, 5, 5), [0, 0, 0, 255]);
        assert_eq!(px(&c, 0, 0), [255, 255, 255, 255]);
    }
}
