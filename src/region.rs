//! Source regions: the capturable subtree handed to the capture stage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::assets::{load_images, AssetLoader, LoadPolicy};
use crate::capture::CaptureOptions;
use crate::display_list::DisplayList;
use crate::dom::{find_by_id, parse_html, DomNode, ElementNode, Tag};
use crate::error::CaptureError;
use crate::fonts::FontManager;
use crate::layout::layout_region;
use crate::style::{style_element, Display};

/// A visual subtree that can lay itself out at a given logical width.
#[async_trait]
pub trait SourceRegion: Send + Sync {
    /// Identifier used in diagnostics.
    fn name(&self) -> &str;

    /// False once the region has been removed from its document.
    fn is_attached(&self) -> bool;

    /// Fonts used for measurement; the rasterizer draws with the same faces.
    fn fonts(&self) -> &FontManager;

    /// Load embedded assets and lay the region out at `logical_width`.
    async fn render(
        &self,
        logical_width: f32,
        options: &CaptureOptions,
    ) -> Result<DisplayList, CaptureError>;
}

/// A region backed by parsed résumé markup.
pub struct MarkupRegion {
    id: String,
    element: ElementNode,
    fonts: FontManager,
    loader: Arc<dyn AssetLoader>,
    origin: Option<String>,
    attached: AtomicBool,
}

impl MarkupRegion {
    /// Resolve the element with `id` in `html`. Returns `None` when the
    /// document has no such element, which leaves the caller's handle unset.
    pub fn from_html(html: &str, id: &str, loader: Arc<dyn AssetLoader>) -> Option<Self> {
        let dom = parse_html(html);
        Self::from_dom(&dom, id, loader)
    }

    pub fn from_dom(dom: &[DomNode], id: &str, loader: Arc<dyn AssetLoader>) -> Option<Self> {
        let element = find_by_id(dom, id)?.clone();
        Some(Self {
            id: id.to_string(),
            element,
            fonts: FontManager::new(),
            loader,
            origin: None,
            attached: AtomicBool::new(true),
        })
    }

    pub fn with_fonts(mut self, fonts: FontManager) -> Self {
        self.fonts = fonts;
        self
    }

    /// Origin the document was served from, e.g. `https://linson.dev`.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Unmount the region. Later captures fail with `Detached`.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }
}

fn collect_image_srcs<'a>(element: &'a ElementNode, out: &mut Vec<&'a str>) {
    if element.tag == Tag::Img {
        if let Some(src) = element.attr("src") {
            out.push(src);
        }
    }
    for child in &element.children {
        if let DomNode::Element(e) = child {
            collect_image_srcs(e, out);
        }
    }
}

#[async_trait]
impl SourceRegion for MarkupRegion {
    fn name(&self) -> &str {
        &self.id
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    async fn render(
        &self,
        logical_width: f32,
        options: &CaptureOptions,
    ) -> Result<DisplayList, CaptureError> {
        let styled = style_element(&self.element, None, logical_width);
        if styled.style().display == Display::None {
            return Err(CaptureError::NotVisible(self.id.clone()));
        }

        let mut srcs = Vec::new();
        collect_image_srcs(&self.element, &mut srcs);
        let images = load_images(
            srcs,
            self.loader.as_ref(),
            LoadPolicy {
                document_origin: self.origin.as_deref(),
                allow_cross_origin_images: options.allow_cross_origin_images,
                logging: options.logging,
            },
        )
        .await;

        layout_region(&styled, logical_width, &self.fonts, &images)
    }
}
