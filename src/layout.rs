//! Layout engine – builds a Taffy tree from a styled region at a given
//! logical width and flattens the result into a [`DisplayList`].
//!
//! Block flow is modelled as a stretching flex column. Runs of inline
//! content inside block flow collapse into one pre-wrapped text leaf; inside
//! flex and grid containers every child is its own item.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use taffy::prelude::*;

use crate::dom::Tag;
use crate::display_list::{DisplayList, Fill, LayoutRect, PaintItem, TextLine};
use crate::error::CaptureError;
use crate::fonts::{FontKey, FontManager};
use crate::style::{self as css, ComputedStyle, StyledNode};

/// Decoded images keyed by their `src` attribute.
pub type ImageMap = HashMap<String, Arc<RgbaImage>>;

/// Lucide's default icon edge.
const DEFAULT_ICON_SIZE: f32 = 24.0;

enum NodeInfo {
    Box {
        style: ComputedStyle,
        marker: Option<String>,
    },
    Text {
        lines: Vec<(String, f32)>,
        style: ComputedStyle,
    },
    Image {
        src: String,
    },
    Icon,
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    images: &'a ImageMap,
    info: HashMap<NodeId, NodeInfo>,
}

fn layout_err(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Layout(e.to_string())
}

fn font_key(style: &ComputedStyle) -> FontKey {
    FontKey {
        bold: style.is_bold(),
        italic: style.italic,
    }
}

/// Concatenate the text of an inline subtree; `<br>` becomes a hard break.
fn collect_inline_text(node: &StyledNode, out: &mut String) {
    match node {
        StyledNode::Text { text, .. } => out.push_str(text),
        StyledNode::Element {
            element, children, ..
        } => {
            if element.tag == Tag::Br {
                out.push('\n');
            }
            for child in children {
                collect_inline_text(child, out);
            }
        }
    }
}

/// Collapse whitespace runs but keep hard breaks.
fn normalize_whitespace(raw: &str) -> String {
    raw.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, images: &'a ImageMap) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            images,
            info: HashMap::new(),
        }
    }

    /// Build `node`. `avail` is the estimated width available for wrapping;
    /// `definite` says whether the parent hands this node a fixed width.
    fn build_node(
        &mut self,
        node: &StyledNode,
        avail: f32,
        definite: bool,
    ) -> Result<Option<NodeId>, CaptureError> {
        match node {
            StyledNode::Text { text, style } => {
                let text = normalize_whitespace(text);
                if text.is_empty() {
                    return Ok(None);
                }
                self.build_text_leaf(&text, style, avail, definite).map(Some)
            }
            StyledNode::Element {
                element,
                style,
                children,
            } => {
                if style.display == css::Display::None {
                    return Ok(None);
                }
                match element.tag {
                    Tag::Img => self
                        .build_image(element.attr("src").unwrap_or_default(), style, avail)
                        .map(Some),
                    Tag::Svg => self.build_icon(element, style).map(Some),
                    _ => self.build_container(element.tag.clone(), style, children, avail, definite),
                }
            }
        }
    }

    fn build_text_leaf(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        avail: f32,
        fill: bool,
    ) -> Result<NodeId, CaptureError> {
        let key = font_key(style);
        let lines: Vec<(String, f32)> = self
            .fonts
            .wrap_text(text, style.font_size, key, avail)
            .into_iter()
            .map(|line| {
                let w = self.fonts.measure_text_width(&line, style.font_size, key);
                (line, w)
            })
            .collect();
        let text_width = lines.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
        let text_height = lines.len() as f32 * style.line_height_px();

        let width = if fill {
            Dimension::Percent(1.0)
        } else {
            Dimension::Length(text_width.ceil())
        };
        let leaf = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width,
                    height: Dimension::Length(text_height),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.info.insert(
            leaf,
            NodeInfo::Text {
                lines,
                style: style.clone(),
            },
        );
        Ok(leaf)
    }

    fn build_image(
        &mut self,
        src: &str,
        style: &ComputedStyle,
        avail: f32,
    ) -> Result<NodeId, CaptureError> {
        let known_w = match style.width {
            css::Dimension::Px(v) => Some(v),
            css::Dimension::Percent(p) => Some(avail * p / 100.0),
            css::Dimension::Auto => None,
        };
        let known_h = match style.height {
            css::Dimension::Px(v) => Some(v),
            _ => None,
        };
        let intrinsic = self
            .images
            .get(src)
            .map(|img| (img.width() as f32, img.height() as f32))
            .filter(|(w, h)| *w > 0.0 && *h > 0.0);

        let (w, h) = match (known_w, known_h, intrinsic) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some((iw, ih))) => (w, w * ih / iw),
            (None, Some(h), Some((iw, ih))) => (h * iw / ih, h),
            (None, None, Some((iw, ih))) => (iw, ih),
            // Unreadable image without explicit size collapses, as a broken
            // image with no alt text does.
            (w, h, None) => (w.unwrap_or(0.0), h.unwrap_or(0.0)),
        };

        let mut ts = self.box_style(style);
        ts.size = Size {
            width: Dimension::Length(w),
            height: Dimension::Length(h),
        };
        ts.flex_shrink = 0.0;
        let node = self.taffy.new_leaf(ts).map_err(layout_err)?;
        self.info.insert(
            node,
            NodeInfo::Image {
                src: src.to_string(),
            },
        );
        Ok(node)
    }

    fn build_icon(
        &mut self,
        element: &crate::dom::ElementNode,
        style: &ComputedStyle,
    ) -> Result<NodeId, CaptureError> {
        let attr_px = |name: &str| {
            element
                .attr(name)
                .and_then(|v| v.trim_end_matches("px").parse::<f32>().ok())
        };
        let size = attr_px("size");
        let w = match style.width {
            css::Dimension::Px(v) => v,
            _ => attr_px("width").or(size).unwrap_or(DEFAULT_ICON_SIZE),
        };
        let h = match style.height {
            css::Dimension::Px(v) => v,
            _ => attr_px("height").or(size).unwrap_or(DEFAULT_ICON_SIZE),
        };
        let mut ts = self.box_style(style);
        ts.size = Size {
            width: Dimension::Length(w),
            height: Dimension::Length(h),
        };
        ts.flex_shrink = 0.0;
        let node = self.taffy.new_leaf(ts).map_err(layout_err)?;
        self.info.insert(node, NodeInfo::Icon);
        Ok(node)
    }

    fn build_container(
        &mut self,
        tag: Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        avail: f32,
        definite: bool,
    ) -> Result<Option<NodeId>, CaptureError> {
        let margin_h: f32 = [style.margin.left, style.margin.right]
            .iter()
            .map(|m| match m {
                css::Margin::Px(v) => *v,
                css::Margin::Auto => 0.0,
            })
            .sum();
        let mut my_width = match style.width {
            css::Dimension::Px(w) => w,
            css::Dimension::Percent(p) => avail * p / 100.0,
            css::Dimension::Auto => avail - margin_h,
        };
        my_width = match style.max_width {
            css::Dimension::Px(m) => my_width.min(m),
            css::Dimension::Percent(p) => my_width.min(avail * p / 100.0),
            css::Dimension::Auto => my_width,
        };
        let inner = (my_width - style.padding.horizontal() - style.border.horizontal()).max(0.0);
        let definite = definite || matches!(style.width, css::Dimension::Px(_));

        let (mode, children_definite, child_avail) = match style.display {
            css::Display::Flex if style.flex_direction == css::FlexDirection::Row => {
                let items = children.iter().filter(|c| !c.is_whitespace()).count().max(1);
                let per_item = if style.flex_wrap {
                    inner
                } else {
                    let gaps = style.column_gap * items.saturating_sub(1) as f32;
                    ((inner - gaps) / items as f32).max(1.0)
                };
                (Flow::Row, false, per_item)
            }
            css::Display::Flex => (
                Flow::Items,
                definite && style.align_items == css::AlignItems::Stretch,
                inner,
            ),
            css::Display::Grid => {
                let cols = style.grid_columns.max(1);
                let gaps = style.column_gap * (cols - 1) as f32;
                (Flow::Items, definite, ((inner - gaps) / cols as f32).max(1.0))
            }
            css::Display::Block | css::Display::Inline | css::Display::None => {
                (Flow::Block, definite, inner)
            }
        };

        let mut child_ids = Vec::new();
        let mut list_counter = 0u32;
        let mut run: Vec<&StyledNode> = Vec::new();

        for child in children {
            if mode == Flow::Block && child.is_inline() {
                run.push(child);
                continue;
            }
            if let Some(id) = self.flush_run(&mut run, style, child_avail, children_definite)? {
                child_ids.push(id);
            }
            let Some(id) = self.build_node(child, child_avail, children_definite)? else {
                continue;
            };
            if let StyledNode::Element {
                element,
                style: child_style,
                ..
            } = child
            {
                if element.tag == Tag::Li && child_style.list_style != css::ListStyle::None {
                    list_counter += 1;
                    let marker = match child_style.list_style {
                        css::ListStyle::Decimal => format!("{list_counter}."),
                        _ => "\u{2022}".to_string(),
                    };
                    if let Some(NodeInfo::Box { marker: slot, .. }) = self.info.get_mut(&id) {
                        *slot = Some(marker);
                    }
                }
            }
            child_ids.push(id);
        }
        if let Some(id) = self.flush_run(&mut run, style, child_avail, children_definite)? {
            child_ids.push(id);
        }

        let ts = self.container_style(style, &tag);
        let node = self
            .taffy
            .new_with_children(ts, &child_ids)
            .map_err(layout_err)?;
        self.info.insert(
            node,
            NodeInfo::Box {
                style: style.clone(),
                marker: None,
            },
        );
        Ok(Some(node))
    }

    /// Turn a run of inline siblings into one text leaf.
    fn flush_run(
        &mut self,
        run: &mut Vec<&StyledNode>,
        parent_style: &ComputedStyle,
        avail: f32,
        fill: bool,
    ) -> Result<Option<NodeId>, CaptureError> {
        if run.is_empty() {
            return Ok(None);
        }
        let mut raw = String::new();
        for node in run.iter() {
            collect_inline_text(node, &mut raw);
        }
        let text_style = match run.as_slice() {
            [single @ StyledNode::Element { .. }] => single.style().clone(),
            _ => parent_style.clone(),
        };
        run.clear();
        let text = normalize_whitespace(&raw);
        if text.is_empty() {
            return Ok(None);
        }
        self.build_text_leaf(&text, &text_style, avail, fill).map(Some)
    }

    /// Margin, padding and border shared by every box.
    fn box_style(&self, s: &ComputedStyle) -> Style {
        let margin = |m: css::Margin| match m {
            css::Margin::Px(v) => LengthPercentageAuto::Length(v),
            css::Margin::Auto => LengthPercentageAuto::Auto,
        };
        Style {
            margin: Rect {
                top: margin(s.margin.top),
                right: margin(s.margin.right),
                bottom: margin(s.margin.bottom),
                left: margin(s.margin.left),
            },
            padding: Rect {
                top: LengthPercentage::Length(s.padding.top),
                right: LengthPercentage::Length(s.padding.right),
                bottom: LengthPercentage::Length(s.padding.bottom),
                left: LengthPercentage::Length(s.padding.left),
            },
            border: Rect {
                top: LengthPercentage::Length(s.border.top),
                right: LengthPercentage::Length(s.border.right),
                bottom: LengthPercentage::Length(s.border.bottom),
                left: LengthPercentage::Length(s.border.left),
            },
            ..Default::default()
        }
    }

    fn container_style(&self, s: &ComputedStyle, tag: &Tag) -> Style {
        let mut ts = self.box_style(s);
        ts.display = taffy::Display::Flex;
        ts.gap = Size {
            width: LengthPercentage::Length(s.column_gap),
            height: LengthPercentage::Length(s.row_gap),
        };

        match s.display {
            css::Display::Grid => {
                ts.display = taffy::Display::Grid;
                ts.grid_template_columns =
                    vec![taffy::TrackSizingFunction::from_flex(1.0); s.grid_columns.max(1)];
            }
            css::Display::Flex => {
                ts.flex_direction = match s.flex_direction {
                    css::FlexDirection::Row => taffy::FlexDirection::Row,
                    css::FlexDirection::Column => taffy::FlexDirection::Column,
                };
                ts.flex_wrap = if s.flex_wrap {
                    taffy::FlexWrap::Wrap
                } else {
                    taffy::FlexWrap::NoWrap
                };
                ts.justify_content = Some(match s.justify_content {
                    css::JustifyContent::Start => taffy::JustifyContent::Start,
                    css::JustifyContent::End => taffy::JustifyContent::End,
                    css::JustifyContent::Center => taffy::JustifyContent::Center,
                    css::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                    css::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                    css::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
                });
                ts.align_items = Some(match s.align_items {
                    css::AlignItems::Start => taffy::AlignItems::Start,
                    css::AlignItems::End => taffy::AlignItems::End,
                    css::AlignItems::Center => taffy::AlignItems::Center,
                    css::AlignItems::Stretch => taffy::AlignItems::Stretch,
                });
            }
            _ => {
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.align_items = Some(taffy::AlignItems::Stretch);
            }
        }

        ts.size = Size {
            width: dimension(s.width),
            height: dimension(s.height),
        };
        // Block boxes centred with auto margins still take the full width,
        // bounded by max-width, as in normal flow.
        let auto_margins = matches!(s.margin.left, css::Margin::Auto)
            || matches!(s.margin.right, css::Margin::Auto);
        if s.width == css::Dimension::Auto && auto_margins {
            ts.size.width = Dimension::Percent(1.0);
        }
        ts.max_size.width = dimension(s.max_width);
        ts.flex_grow = s.flex_grow;
        ts.flex_shrink = s.flex_shrink;
        if s.flex_grow > 0.0 {
            ts.flex_basis = Dimension::Length(0.0);
            ts.min_size.width = Dimension::Length(0.0);
        }
        if *tag == Tag::Hr {
            ts.size.height = Dimension::Length(0.0);
        }
        ts
    }

    /// Walk the computed tree and emit paint items in document order.
    fn extract(&self, node: NodeId, ox: f32, oy: f32, out: &mut Vec<PaintItem>) -> Result<(), CaptureError> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let x = ox + layout.location.x;
        let y = oy + layout.location.y;
        let rect = LayoutRect::new(x, y, layout.size.width, layout.size.height);

        match self.info.get(&node) {
            Some(NodeInfo::Box { style, marker }) => {
                paint_box(style, rect, out);
                if let Some(marker) = marker {
                    let key = font_key(style);
                    let lh = style.line_height_px();
                    let width = self.fonts.measure_text_width(marker, style.font_size, key);
                    let top = y + style.padding.top + style.border.top;
                    out.push(PaintItem::Text {
                        lines: vec![TextLine {
                            text: marker.clone(),
                            x: x + style.padding.left - width - style.font_size * 0.5,
                            baseline: top + self.fonts.baseline_offset(style.font_size, lh, key),
                            width,
                        }],
                        font_size: style.font_size,
                        bold: false,
                        italic: false,
                        underline: false,
                        color: style.color.into(),
                    });
                }
            }
            Some(NodeInfo::Text { lines, style }) => {
                let key = font_key(style);
                let lh = style.line_height_px();
                let baseline = self.fonts.baseline_offset(style.font_size, lh, key);
                let lines = lines
                    .iter()
                    .enumerate()
                    .map(|(i, (text, width))| {
                        let slack = (rect.width - width).max(0.0);
                        let dx = match style.text_align {
                            css::TextAlign::Left => 0.0,
                            css::TextAlign::Center => slack / 2.0,
                            css::TextAlign::Right => slack,
                        };
                        TextLine {
                            text: text.clone(),
                            x: x + dx,
                            baseline: y + i as f32 * lh + baseline,
                            width: *width,
                        }
                    })
                    .collect();
                out.push(PaintItem::Text {
                    lines,
                    font_size: style.font_size,
                    bold: style.is_bold(),
                    italic: style.italic,
                    underline: style.underline,
                    color: style.color.into(),
                });
            }
            Some(NodeInfo::Image { src }) => {
                out.push(PaintItem::Image {
                    rect,
                    src: src.clone(),
                    pixels: self.images.get(src).cloned(),
                });
            }
            Some(NodeInfo::Icon) | None => {}
        }

        for child in self.taffy.children(node).map_err(layout_err)? {
            self.extract(child, x, y, out)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Normal block flow; inline runs merge into text leaves.
    Block,
    /// Horizontal flex; items shrink to fit.
    Row,
    /// Column flex or grid; every child is an item.
    Items,
}

fn dimension(d: css::Dimension) -> Dimension {
    match d {
        css::Dimension::Auto => Dimension::Auto,
        css::Dimension::Px(v) => Dimension::Length(v),
        css::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
    }
}

fn paint_box(style: &ComputedStyle, rect: LayoutRect, out: &mut Vec<PaintItem>) {
    if rect.is_empty() && !style.has_border() {
        return;
    }
    if let Some(g) = style.gradient {
        out.push(PaintItem::Rect {
            rect,
            fill: Fill::LinearGradient {
                direction: g.direction.into(),
                from: g.from.into(),
                to: g.to.into(),
            },
            radius: style.radius,
        });
    } else if !style.background_color.is_transparent() {
        out.push(PaintItem::Rect {
            rect,
            fill: Fill::Solid(style.background_color.into()),
            radius: style.radius,
        });
    }
    if style.has_border() && !style.border_color.is_transparent() {
        out.push(PaintItem::Border {
            rect,
            widths: [
                style.border.top,
                style.border.right,
                style.border.bottom,
                style.border.left,
            ],
            color: style.border_color.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out `region` at `width` logical px and return its display list. The
/// list's height is the region's natural height including its margins.
pub fn layout_region(
    region: &StyledNode,
    width: f32,
    fonts: &FontManager,
    images: &ImageMap,
) -> Result<DisplayList, CaptureError> {
    let mut builder = LayoutBuilder::new(fonts, images);
    let children: Vec<NodeId> = builder
        .build_node(region, width, true)?
        .into_iter()
        .collect();

    let root = builder
        .taffy
        .new_with_children(
            Style {
                display: taffy::Display::Flex,
                flex_direction: taffy::FlexDirection::Column,
                align_items: Some(taffy::AlignItems::Stretch),
                size: Size {
                    width: Dimension::Length(width),
                    height: Dimension::Auto,
                },
                ..Default::default()
            },
            &children,
        )
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    let height = builder.taffy.layout(root).map_err(layout_err)?.size.height;
    let mut items = Vec::new();
    builder.extract(root, 0.0, 0.0, &mut items)?;
    Ok(DisplayList {
        width,
        height,
        items,
    })
}
