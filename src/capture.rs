//! Capture stage: lay a region out at a fixed logical width and rasterize it
//! at a fixed device-pixel scale.
//!
//! The host viewport only matters when no fixed logical width is configured.
//! Its device pixel ratio is never used, so the same region produces the same
//! pixels on every display.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::raster::Canvas;
use crate::region::SourceRegion;

pub const DEFAULT_LOGICAL_WIDTH: f32 = 1200.0;
pub const DEFAULT_SCALE: f32 = 1.5;
/// Largest bitmap edge most rasterizers and viewers accept.
pub const MAX_SURFACE_DIMENSION: u32 = 32767;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Device pixels per logical pixel.
    pub scale: f32,
    pub allow_cross_origin_images: bool,
    /// Emit `debug` diagnostics for this capture.
    pub logging: bool,
    /// Layout width; `None` falls back to the host viewport width.
    pub fixed_logical_width: Option<f32>,
    /// Surface fill before painting.
    pub background: [u8; 3],
    pub max_surface_dimension: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            allow_cross_origin_images: true,
            logging: false,
            fixed_logical_width: Some(DEFAULT_LOGICAL_WIDTH),
            background: [255, 255, 255],
            max_surface_dimension: MAX_SURFACE_DIMENSION,
        }
    }
}

impl CaptureOptions {
    fn validate(&self) -> Result<(), CaptureError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(CaptureError::InvalidOptions(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if let Some(w) = self.fixed_logical_width {
            if !(w.is_finite() && w > 0.0) {
                return Err(CaptureError::InvalidOptions(format!(
                    "fixed logical width must be positive, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// The host's real viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            device_pixel_ratio,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_LOGICAL_WIDTH, 1.0)
    }
}

/// A captured bitmap in device pixels.
#[derive(Debug, Clone)]
pub struct RasterSnapshot {
    pixels: RgbaImage,
}

impl RasterSnapshot {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Capture `region` as a bitmap.
///
/// Output size is `round(logical_width * scale)` by
/// `round(natural_height * scale)`. Unreadable images paint blank; every
/// other problem fails the capture.
pub async fn capture(
    region: Option<&dyn SourceRegion>,
    viewport: Viewport,
    options: &CaptureOptions,
) -> Result<RasterSnapshot, CaptureError> {
    options.validate()?;
    let region = region.ok_or(CaptureError::RegionMissing)?;
    if !region.is_attached() {
        return Err(CaptureError::Detached(region.name().to_string()));
    }

    let logical_width = options.fixed_logical_width.unwrap_or(viewport.width);
    if options.logging {
        log::debug!(
            "capturing `{}` at {}px (host viewport {}px @{}x, scale {})",
            region.name(),
            logical_width,
            viewport.width,
            viewport.device_pixel_ratio,
            options.scale
        );
    }

    let list = region.render(logical_width, options).await?;
    if !(list.width > 0.0 && list.height > 0.0) {
        return Err(CaptureError::EmptyRegion {
            width: list.width,
            height: list.height,
        });
    }

    let width = (list.width * options.scale).round().max(1.0);
    let height = (list.height * options.scale).round().max(1.0);
    let max = options.max_surface_dimension;
    if width > max as f32 || height > max as f32 {
        return Err(CaptureError::SurfaceTooLarge {
            width: width as u32,
            height: height as u32,
            max,
        });
    }
    let (width, height) = (width as u32, height as u32);

    let mut canvas = Canvas::new(width, height, options.scale, options.background);
    canvas.paint(&list, region.fonts());
    if options.logging {
        log::debug!(
            "captured `{}`: {} items -> {}x{} px ({} blank images)",
            region.name(),
            list.items.len(),
            width,
            height,
            list.blank_images()
        );
    }
    Ok(RasterSnapshot::new(canvas.into_image()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LocalAssets;
    use crate::region::MarkupRegion;
    use std::sync::Arc;

    fn region(html: &str) -> MarkupRegion {
        MarkupRegion::from_html(html, "resume", Arc::new(LocalAssets::new("."))).unwrap()
    }

    #[tokio::test]
    async fn snapshot_is_logical_size_times_scale() {
        let r = region(r#"<div id="resume" style="height: 100px"></div>"#);
        let snap = capture(Some(&r), Viewport::new(375.0, 3.0), &CaptureOptions::default())
            .await
            .unwrap();
        assert_eq!((snap.width(), snap.height()), (1800, 150));
    }

    #[tokio::test]
    async fn viewport_width_used_without_fixed_width() {
        let r = region(r#"<div id="resume" style="height: 10px"></div>"#);
        let options = CaptureOptions {
            fixed_logical_width: None,
            scale: 2.0,
            ..Default::default()
        };
        let snap = capture(Some(&r), Viewport::new(400.0, 1.0), &options)
            .await
            .unwrap();
        assert_eq!((snap.width(), snap.height()), (800, 20));
    }

    #[tokio::test]
    async fn missing_region_fails() {
        let err = capture(None, Viewport::default(), &CaptureOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::RegionMissing));
    }

    #[tokio::test]
    async fn detached_region_fails() {
        let r = region(r#"<div id="resume" style="height: 10px"></div>"#);
        r.detach();
        let err = capture(Some(&r), Viewport::default(), &CaptureOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Detached(_)));
    }

    #[tokio::test]
    async fn empty_region_fails() {
        let r = region(r#"<div id="resume"></div>"#);
        let err = capture(Some(&r), Viewport::default(), &CaptureOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::EmptyRegion { .. }));
    }

    #[tokio::test]
    async fn oversized_surface_fails() {
        let r = region(r#"<div id="resume" style="height: 30000px"></div>"#);
        let err = capture(Some(&r), Viewport::default(), &CaptureOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::SurfaceTooLarge {
                height: 45000,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn invalid_scale_is_rejected() {
        let r = region(r#"<div id="resume" style="height: 10px"></div>"#);
        let options = CaptureOptions {
            scale: 0.0,
            ..Default::default()
        };
        let err = capture(Some(&r), Viewport::default(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidOptions(_)));
    }

    #[test]
    fn options_fill_missing_fields_from_defaults() {
        let options: CaptureOptions = serde_json::from_str(r#"{ "scale": 2.0 }"#).unwrap();
        assert_eq!(options.scale, 2.0);
        assert_eq!(options.fixed_logical_width, Some(1200.0));
        assert!(options.allow_cross_origin_images);
    }
}
