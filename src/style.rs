//! Style resolver – maps Tailwind utility classes and inline `style`
//! attributes to a flat [`ComputedStyle`].
//!
//! Responsive prefixes (`sm:`, `md:`, `lg:`, `xl:`, `2xl:`) are resolved
//! against the layout width handed in by the caller, not the host window, so
//! a capture at a fixed logical width always picks the same variants. State
//! variants such as `hover:` never match a static capture and are skipped.
//! Base styles follow Tailwind's preflight reset since résumé markup is
//! written against it.

use crate::dom::{DomNode, ElementNode, Tag};

/// Fully resolved style for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: bool,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    /// Horizontal gap between flex/grid items.
    pub column_gap: f32,
    /// Vertical gap between rows, also fed by `space-y-*`.
    pub row_gap: f32,
    pub grid_columns: usize,

    pub width: Dimension,
    pub height: Dimension,
    pub max_width: Dimension,

    pub margin: Edges<Margin>,
    pub padding: Edges<f32>,
    pub border: Edges<f32>,
    pub border_color: Color,
    pub radius: f32,

    pub background_color: Color,
    pub gradient: Option<Gradient>,

    pub font_size: f32,
    pub font_weight: u16,
    pub italic: bool,
    pub color: Color,
    pub text_align: TextAlign,
    /// Multiple of `font_size`.
    pub line_height: f32,
    pub underline: bool,
    pub uppercase: bool,
    pub list_style: ListStyle,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: false,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            column_gap: 0.0,
            row_gap: 0.0,
            grid_columns: 0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            margin: Edges::uniform(Margin::Px(0.0)),
            padding: Edges::uniform(0.0),
            border: Edges::uniform(0.0),
            border_color: GRAY_200,
            radius: 0.0,
            background_color: Color::TRANSPARENT,
            gradient: None,
            font_size: 16.0,
            font_weight: 400,
            italic: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.5,
            underline: false,
            uppercase: false,
            list_style: ListStyle::None,
        }
    }
}

impl ComputedStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight >= 600
    }

    pub fn line_height_px(&self) -> f32 {
        self.font_size * self.line_height
    }

    pub fn has_border(&self) -> bool {
        self.border.top > 0.0
            || self.border.right > 0.0
            || self.border.bottom > 0.0
            || self.border.left > 0.0
    }

    /// Copy of the inheritable text properties only.
    fn inherited(&self) -> Self {
        Self {
            font_size: self.font_size,
            font_weight: self.font_weight,
            italic: self.italic,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            underline: self.underline,
            uppercase: self.uppercase,
            list_style: self.list_style,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    None,
    Disc,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Margin {
    Auto,
    Px(f32),
}

/// Per-side values in CSS order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edges<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Edges<T> {
    pub fn uniform(v: T) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

impl Edges<f32> {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientDirection {
    ToRight,
    ToLeft,
    ToBottom,
    ToTop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub direction: GradientDirection,
    pub from: Color,
    pub to: Color,
}

/// RGBA colour, components in 0.0 – 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#hex`, `rgb()`/`rgba()`, `white`, `black` or `transparent`.
    pub fn parse_css(value: &str) -> Option<Self> {
        let value = value.trim();
        match value {
            "white" => return Some(Self::WHITE),
            "black" => return Some(Self::BLACK),
            "transparent" => return Some(Self::TRANSPARENT),
            _ => {}
        }
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        let inner = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<f32> = inner
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
            [r, g, b, a] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0).with_alpha(*a)),
            _ => None,
        }
    }
}

const GRAY_200: Color = Color::rgb(0.898, 0.906, 0.922);

// Tailwind v3 palette, shades 50, 100, 200 … 900.
const PALETTE: &[(&str, [&str; 10])] = &[
    (
        "gray",
        [
            "#f9fafb", "#f3f4f6", "#e5e7eb", "#d1d5db", "#9ca3af", "#6b7280", "#4b5563",
            "#374151", "#1f2937", "#111827",
        ],
    ),
    (
        "slate",
        [
            "#f8fafc", "#f1f5f9", "#e2e8f0", "#cbd5e1", "#94a3b8", "#64748b", "#475569",
            "#334155", "#1e293b", "#0f172a",
        ],
    ),
    (
        "blue",
        [
            "#eff6ff", "#dbeafe", "#bfdbfe", "#93c5fd", "#60a5fa", "#3b82f6", "#2563eb",
            "#1d4ed8", "#1e40af", "#1e3a8a",
        ],
    ),
    (
        "indigo",
        [
            "#eef2ff", "#e0e7ff", "#c7d2fe", "#a5b4fc", "#818cf8", "#6366f1", "#4f46e5",
            "#4338ca", "#3730a3", "#312e81",
        ],
    ),
    (
        "green",
        [
            "#f0fdf4", "#dcfce7", "#bbf7d0", "#86efac", "#4ade80", "#22c55e", "#16a34a",
            "#15803d", "#166534", "#14532d",
        ],
    ),
    (
        "red",
        [
            "#fef2f2", "#fee2e2", "#fecaca", "#fca5a5", "#f87171", "#ef4444", "#dc2626",
            "#b91c1c", "#991b1b", "#7f1d1d",
        ],
    ),
];

/// Resolve a Tailwind colour token such as `blue-600`, `white` or
/// `white/10`.
pub fn tailwind_color(token: &str) -> Option<Color> {
    let (name, opacity) = match token.split_once('/') {
        Some((name, pct)) => (name, Some(pct.parse::<f32>().ok()? / 100.0)),
        None => (token, None),
    };
    let color = match name {
        "white" => Color::WHITE,
        "black" => Color::BLACK,
        "transparent" => Color::TRANSPARENT,
        _ => {
            let (hue, shade) = name.rsplit_once('-')?;
            let idx = match shade {
                "50" => 0,
                s => s.parse::<usize>().ok().filter(|v| v % 100 == 0 && (100..=900).contains(v))? / 100,
            };
            let (_, shades) = PALETTE.iter().find(|(h, _)| *h == hue)?;
            Color::from_hex(shades[idx])?
        }
    };
    Some(match opacity {
        Some(a) => color.with_alpha(color.a * a),
        None => color,
    })
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

const BREAKPOINTS: &[(&str, f32)] = &[
    ("sm", 640.0),
    ("md", 768.0),
    ("lg", 1024.0),
    ("xl", 1280.0),
    ("2xl", 1536.0),
];

/// Resolve the style of `element` at the given layout width.
pub fn resolve_style(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    layout_width: f32,
) -> ComputedStyle {
    let mut style = parent.map(ComputedStyle::inherited).unwrap_or_default();
    apply_tag_defaults(&mut style, &element.tag);

    // Unprefixed utilities first, then breakpoints in ascending order, so a
    // wider breakpoint wins regardless of class order.
    let mut applicable: Vec<(f32, &str)> = Vec::new();
    for class in element.classes() {
        let mut parts: Vec<&str> = class.split(':').collect();
        let Some(utility) = parts.pop() else { continue };
        let mut min_width = 0.0f32;
        let mut matches = true;
        for variant in parts {
            match BREAKPOINTS.iter().find(|(name, _)| *name == variant) {
                Some((_, bp)) => min_width = min_width.max(*bp),
                None => matches = false,
            }
        }
        if matches && layout_width >= min_width {
            applicable.push((min_width, utility));
        }
    }
    applicable.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut gradient = GradientBuilder::default();
    for (_, utility) in applicable {
        apply_utility(&mut style, &mut gradient, utility, layout_width);
    }
    style.gradient = gradient.finish();

    if let Some(inline) = element.attr("style") {
        apply_inline_style(&mut style, inline);
    }
    style
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    if tag.is_inline() {
        s.display = Display::Inline;
    }
    match tag {
        Tag::Strong => s.font_weight = 700,
        Tag::Em => s.italic = true,
        Tag::Hr => {
            s.border.top = 1.0;
        }
        Tag::Ul => s.list_style = ListStyle::None,
        _ => {}
    }
}

#[derive(Default)]
struct GradientBuilder {
    direction: Option<GradientDirection>,
    from: Option<Color>,
    to: Option<Color>,
}

impl GradientBuilder {
    fn finish(self) -> Option<Gradient> {
        let direction = self.direction?;
        let from = self.from.unwrap_or(Color::TRANSPARENT);
        Some(Gradient {
            direction,
            from,
            to: self.to.unwrap_or(from.with_alpha(0.0)),
        })
    }
}

fn apply_utility(s: &mut ComputedStyle, g: &mut GradientBuilder, class: &str, width: f32) {
    match class {
        "flex" | "inline-flex" => s.display = Display::Flex,
        "grid" => s.display = Display::Grid,
        "block" | "inline-block" => s.display = Display::Block,
        "inline" => s.display = Display::Inline,
        "hidden" => s.display = Display::None,

        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-wrap" => s.flex_wrap = true,
        "flex-nowrap" => s.flex_wrap = false,
        "flex-1" => {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
        }
        "grow" | "flex-grow" => s.flex_grow = 1.0,
        "shrink-0" | "flex-shrink-0" => s.flex_shrink = 0.0,

        "justify-start" => s.justify_content = JustifyContent::Start,
        "justify-end" => s.justify_content = JustifyContent::End,
        "justify-center" => s.justify_content = JustifyContent::Center,
        "justify-between" => s.justify_content = JustifyContent::SpaceBetween,
        "justify-around" => s.justify_content = JustifyContent::SpaceAround,
        "justify-evenly" => s.justify_content = JustifyContent::SpaceEvenly,
        "items-start" => s.align_items = AlignItems::Start,
        "items-end" => s.align_items = AlignItems::End,
        "items-center" => s.align_items = AlignItems::Center,
        "items-stretch" => s.align_items = AlignItems::Stretch,

        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,

        "italic" => s.italic = true,
        "not-italic" => s.italic = false,
        "underline" => s.underline = true,
        "no-underline" => s.underline = false,
        "uppercase" => s.uppercase = true,
        "normal-case" => s.uppercase = false,
        "list-disc" => s.list_style = ListStyle::Disc,
        "list-decimal" => s.list_style = ListStyle::Decimal,
        "list-none" => s.list_style = ListStyle::None,

        "font-thin" => s.font_weight = 100,
        "font-light" => s.font_weight = 300,
        "font-normal" => s.font_weight = 400,
        "font-medium" => s.font_weight = 500,
        "font-semibold" => s.font_weight = 600,
        "font-bold" => s.font_weight = 700,
        "font-extrabold" => s.font_weight = 800,

        "leading-none" => s.line_height = 1.0,
        "leading-tight" => s.line_height = 1.25,
        "leading-snug" => s.line_height = 1.375,
        "leading-normal" => s.line_height = 1.5,
        "leading-relaxed" => s.line_height = 1.625,
        "leading-loose" => s.line_height = 2.0,

        "container" => {
            s.width = Dimension::Percent(100.0);
            s.max_width = BREAKPOINTS
                .iter()
                .take(4)
                .rev()
                .find(|(_, bp)| width >= *bp)
                .map_or(Dimension::Auto, |(_, bp)| Dimension::Px(*bp));
        }
        "mx-auto" => {
            s.margin.left = Margin::Auto;
            s.margin.right = Margin::Auto;
        }

        "bg-gradient-to-r" => g.direction = Some(GradientDirection::ToRight),
        "bg-gradient-to-l" => g.direction = Some(GradientDirection::ToLeft),
        "bg-gradient-to-b" => g.direction = Some(GradientDirection::ToBottom),
        "bg-gradient-to-t" => g.direction = Some(GradientDirection::ToTop),

        _ => {
            let _ = apply_text_size(s, class)
                || apply_spacing(s, class)
                || apply_border(s, class)
                || apply_sizing(s, class)
                || apply_color(s, g, class);
        }
    }
}

fn apply_text_size(s: &mut ComputedStyle, class: &str) -> bool {
    let (size, leading) = match class {
        "text-xs" => (12.0, 16.0),
        "text-sm" => (14.0, 20.0),
        "text-base" => (16.0, 24.0),
        "text-lg" => (18.0, 28.0),
        "text-xl" => (20.0, 28.0),
        "text-2xl" => (24.0, 32.0),
        "text-3xl" => (30.0, 36.0),
        "text-4xl" => (36.0, 40.0),
        "text-5xl" => (48.0, 48.0),
        _ => return false,
    };
    s.font_size = size;
    s.line_height = leading / size;
    true
}

/// Tailwind spacing scale: `4` → 16px, `0.5` → 2px, `px` → 1px.
fn spacing_value(token: &str) -> Option<f32> {
    if token == "px" {
        return Some(1.0);
    }
    token.parse::<f32>().ok().map(|v| v * 4.0)
}

fn apply_spacing(s: &mut ComputedStyle, class: &str) -> bool {
    let Some((prefix, token)) = class.split_once('-') else {
        return false;
    };
    if prefix.starts_with('m') && token == "auto" {
        match prefix {
            "m" => s.margin = Edges::uniform(Margin::Auto),
            "mx" => {
                s.margin.left = Margin::Auto;
                s.margin.right = Margin::Auto;
            }
            "ml" => s.margin.left = Margin::Auto,
            "mr" => s.margin.right = Margin::Auto,
            _ => return false,
        }
        return true;
    }
    // gap-x-4 / space-y-2 carry a second axis token.
    let (prefix, token) = match (prefix, token.split_once('-')) {
        ("gap", Some(("x", rest))) => ("gap-x", rest),
        ("gap", Some(("y", rest))) => ("gap-y", rest),
        ("space", Some(("x", rest))) => ("space-x", rest),
        ("space", Some(("y", rest))) => ("space-y", rest),
        _ => (prefix, token),
    };
    let Some(v) = spacing_value(token) else {
        return false;
    };
    let px = Margin::Px(v);
    match prefix {
        "p" => s.padding = Edges::uniform(v),
        "px" => {
            s.padding.left = v;
            s.padding.right = v;
        }
        "py" => {
            s.padding.top = v;
            s.padding.bottom = v;
        }
        "pt" => s.padding.top = v,
        "pr" => s.padding.right = v,
        "pb" => s.padding.bottom = v,
        "pl" => s.padding.left = v,
        "m" => s.margin = Edges::uniform(px),
        "mx" => {
            s.margin.left = px;
            s.margin.right = px;
        }
        "my" => {
            s.margin.top = px;
            s.margin.bottom = px;
        }
        "mt" => s.margin.top = px,
        "mr" => s.margin.right = px,
        "mb" => s.margin.bottom = px,
        "ml" => s.margin.left = px,
        "gap" => {
            s.column_gap = v;
            s.row_gap = v;
        }
        "gap-x" | "space-x" => s.column_gap = v,
        "gap-y" | "space-y" => s.row_gap = v,
        _ => return false,
    }
    true
}

fn apply_border(s: &mut ComputedStyle, class: &str) -> bool {
    if let Some(rest) = class.strip_prefix("rounded") {
        s.radius = match rest {
            "" => 4.0,
            "-none" => 0.0,
            "-sm" => 2.0,
            "-md" => 6.0,
            "-lg" => 8.0,
            "-xl" => 12.0,
            "-2xl" => 16.0,
            "-3xl" => 24.0,
            "-full" => 9999.0,
            _ => return false,
        };
        return true;
    }
    let Some(rest) = class.strip_prefix("border") else {
        return false;
    };
    let (side, width) = match rest.strip_prefix('-') {
        None if rest.is_empty() => ("", "1"),
        None => return false,
        Some(token) => match token.split_once('-') {
            Some((side @ ("t" | "r" | "b" | "l" | "x" | "y"), w)) => (side, w),
            None if matches!(token, "t" | "r" | "b" | "l" | "x" | "y") => (token, "1"),
            None if token.parse::<f32>().is_ok() => ("", token),
            _ => {
                if let Some(color) = tailwind_color(token) {
                    s.border_color = color;
                    return true;
                }
                return false;
            }
        },
    };
    let Ok(w) = width.parse::<f32>() else {
        return false;
    };
    match side {
        "" => s.border = Edges::uniform(w),
        "t" => s.border.top = w,
        "r" => s.border.right = w,
        "b" => s.border.bottom = w,
        "l" => s.border.left = w,
        "x" => {
            s.border.left = w;
            s.border.right = w;
        }
        "y" => {
            s.border.top = w;
            s.border.bottom = w;
        }
        _ => return false,
    }
    true
}

fn fraction_percent(token: &str) -> Option<f32> {
    let (n, d) = token.split_once('/')?;
    let (n, d) = (n.parse::<f32>().ok()?, d.parse::<f32>().ok()?);
    (d > 0.0).then(|| n / d * 100.0)
}

fn apply_sizing(s: &mut ComputedStyle, class: &str) -> bool {
    if let Some(token) = class.strip_prefix("max-w-") {
        s.max_width = match token {
            "none" => Dimension::Auto,
            "full" => Dimension::Percent(100.0),
            "xs" => Dimension::Px(320.0),
            "sm" => Dimension::Px(384.0),
            "md" => Dimension::Px(448.0),
            "lg" => Dimension::Px(512.0),
            "xl" => Dimension::Px(576.0),
            "2xl" => Dimension::Px(672.0),
            "3xl" => Dimension::Px(768.0),
            "4xl" => Dimension::Px(896.0),
            "5xl" => Dimension::Px(1024.0),
            "6xl" => Dimension::Px(1152.0),
            "7xl" => Dimension::Px(1280.0),
            _ => return false,
        };
        return true;
    }
    if let Some(token) = class.strip_prefix("grid-cols-") {
        return match token.parse::<usize>() {
            Ok(n) => {
                s.grid_columns = n;
                true
            }
            Err(_) => false,
        };
    }
    let (target, token) = if let Some(t) = class.strip_prefix("w-") {
        (&mut s.width, t)
    } else if let Some(t) = class.strip_prefix("h-") {
        (&mut s.height, t)
    } else {
        return false;
    };
    *target = match token {
        "auto" => Dimension::Auto,
        "full" => Dimension::Percent(100.0),
        t => match fraction_percent(t) {
            Some(p) => Dimension::Percent(p),
            None => match spacing_value(t) {
                Some(v) => Dimension::Px(v),
                None => return false,
            },
        },
    };
    true
}

fn apply_color(s: &mut ComputedStyle, g: &mut GradientBuilder, class: &str) -> bool {
    let Some((kind, token)) = class.split_once('-') else {
        return false;
    };
    let Some(color) = tailwind_color(token) else {
        return false;
    };
    match kind {
        "text" => s.color = color,
        "bg" => s.background_color = color,
        "from" => g.from = Some(color),
        "to" => g.to = Some(color),
        _ => return false,
    }
    true
}

// ---------------------------------------------------------------------------
// Inline style attribute
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut ComputedStyle, declarations: &str) {
    for decl in declarations.split(';') {
        if let Some((prop, value)) = decl.split_once(':') {
            apply_css_property(s, &prop.trim().to_ascii_lowercase(), value.trim());
        }
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" => {
            s.display = match val {
                "flex" | "inline-flex" => Display::Flex,
                "grid" => Display::Grid,
                "block" | "inline-block" => Display::Block,
                "inline" => Display::Inline,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = if val.starts_with("column") {
                FlexDirection::Column
            } else {
                FlexDirection::Row
            }
        }
        "font-size" => {
            if let Some(px) = parse_px(val) {
                s.font_size = px;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" => 700,
                "normal" => 400,
                v => v.parse().unwrap_or(s.font_weight),
            }
        }
        "font-style" => s.italic = val == "italic",
        "color" => {
            if let Some(c) = Color::parse_css(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse_css(val) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(px) = parse_px(val) {
                s.line_height = px / s.font_size;
            }
        }
        "width" => s.width = parse_dimension(val),
        "height" => s.height = parse_dimension(val),
        "max-width" => s.max_width = parse_dimension(val),
        "gap" => {
            if let Some(px) = parse_px(val) {
                s.row_gap = px;
                s.column_gap = px;
            }
        }
        "border-radius" => {
            if let Some(px) = parse_px(val) {
                s.radius = px;
            }
        }
        "border-width" => {
            if let Some(px) = parse_px(val) {
                s.border = Edges::uniform(px);
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse_css(val) {
                s.border_color = c;
            }
        }
        "padding" => {
            if let Some(e) = parse_box_shorthand(val, parse_px) {
                s.padding = e;
            }
        }
        "margin" => {
            if let Some(e) = parse_box_shorthand(val, parse_margin) {
                s.margin = e;
            }
        }
        _ => {
            if let Some(side) = prop.strip_prefix("padding-") {
                if let (Some(slot), Some(px)) = (edge_mut(&mut s.padding, side), parse_px(val)) {
                    *slot = px;
                }
            } else if let Some(side) = prop.strip_prefix("margin-") {
                if let (Some(slot), Some(m)) = (edge_mut(&mut s.margin, side), parse_margin(val)) {
                    *slot = m;
                }
            }
        }
    }
}

fn edge_mut<'a, T>(edges: &'a mut Edges<T>, side: &str) -> Option<&'a mut T> {
    match side {
        "top" => Some(&mut edges.top),
        "right" => Some(&mut edges.right),
        "bottom" => Some(&mut edges.bottom),
        "left" => Some(&mut edges.left),
        _ => None,
    }
}

fn parse_px(s: &str) -> Option<f32> {
    let s = s.trim();
    if s == "0" {
        return Some(0.0);
    }
    s.strip_suffix("px").unwrap_or(s).trim().parse().ok()
}

fn parse_margin(s: &str) -> Option<Margin> {
    if s.trim() == "auto" {
        Some(Margin::Auto)
    } else {
        parse_px(s).map(Margin::Px)
    }
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if let Some(pct) = s.strip_suffix('%') {
        return pct.trim().parse().map_or(Dimension::Auto, Dimension::Percent);
    }
    parse_px(s).map_or(Dimension::Auto, Dimension::Px)
}

fn parse_box_shorthand<T: Copy>(val: &str, parse: fn(&str) -> Option<T>) -> Option<Edges<T>> {
    let parts: Vec<T> = val
        .split_whitespace()
        .map(parse)
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [a] => Some(Edges::uniform(*a)),
        [v, h] => Some(Edges {
            top: *v,
            right: *h,
            bottom: *v,
            left: *h,
        }),
        [t, h, b] => Some(Edges {
            top: *t,
            right: *h,
            bottom: *b,
            left: *h,
        }),
        [t, r, b, l] => Some(Edges {
            top: *t,
            right: *r,
            bottom: *b,
            left: *l,
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        element: ElementNode,
        style: ComputedStyle,
        children: Vec<StyledNode>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, StyledNode::Text { text, .. } if text.trim().is_empty())
    }

    /// True for text and `display: inline` elements.
    pub fn is_inline(&self) -> bool {
        match self {
            StyledNode::Text { .. } => true,
            StyledNode::Element { style, .. } => style.display == Display::Inline,
        }
    }
}

/// Style `element` and its subtree at `layout_width`.
pub fn style_element(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    layout_width: f32,
) -> StyledNode {
    let style = resolve_style(element, parent, layout_width);
    let children = style_children(&element.children, &style, layout_width);
    StyledNode::Element {
        element: ElementNode {
            children: Vec::new(),
            ..element.clone()
        },
        style,
        children,
    }
}

fn style_children(nodes: &[DomNode], parent: &ComputedStyle, layout_width: f32) -> Vec<StyledNode> {
    nodes
        .iter()
        .map(|node| match node {
            DomNode::Element(e) => style_element(e, Some(parent), layout_width),
            DomNode::Text(text) => {
                let text = if parent.uppercase {
                    text.to_uppercase()
                } else {
                    text.clone()
                };
                StyledNode::Text {
                    text,
                    style: parent.inherited(),
                }
            }
        })
        .collect()
}
