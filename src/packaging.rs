//! Packaging stage – wraps a raster snapshot into a one-page PDF using
//! `printpdf` (v0.8 ops-based API).
//!
//! The page is always `page_width_mm` wide and exactly as tall as the
//! snapshot's aspect ratio requires; the image covers it edge to edge.

use std::io::Cursor;

use ::image::{DynamicImage, RgbImage};
use printpdf::*;
use serde::{Deserialize, Serialize};

use crate::capture::RasterSnapshot;
use crate::error::PackagingError;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const DEFAULT_FILE_NAME: &str = "Linson_Thomas_Resume.pdf";
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

const PT_PER_MM: f64 = 72.0 / 25.4;

/// Page size derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageGeometry {
    /// `width_mm` wide, `width_mm * height / width` tall.
    pub fn for_snapshot(width_mm: f64, px_width: u32, px_height: u32) -> Self {
        let aspect = f64::from(px_height) / f64::from(px_width);
        Self {
            width_mm,
            height_mm: width_mm * aspect,
        }
    }

    pub fn aspect(&self) -> f64 {
        self.height_mm / self.width_mm
    }

    /// Portrait unless the snapshot is wider than tall. The page keeps its
    /// computed dimensions either way; nothing is swapped.
    pub fn is_portrait(&self) -> bool {
        self.height_mm >= self.width_mm
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingOptions {
    pub page_width_mm: f64,
    pub jpeg_quality: u8,
    pub file_name: String,
    /// PDF document title.
    pub title: String,
}

impl Default for PackagingOptions {
    fn default() -> Self {
        Self {
            page_width_mm: PAGE_WIDTH_MM,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            file_name: DEFAULT_FILE_NAME.to_string(),
            title: "Linson Thomas Resume".to_string(),
        }
    }
}

impl PackagingOptions {
    fn validate(&self) -> Result<(), PackagingError> {
        if !(self.page_width_mm.is_finite() && self.page_width_mm > 0.0) {
            return Err(PackagingError::InvalidOptions(format!(
                "page width must be positive, got {} mm",
                self.page_width_mm
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PackagingError::InvalidOptions(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// printpdf re-encodes embedded images on save. Keep that pass at the
    /// configured quality, with no resizing or colour reduction.
    fn save_options(&self) -> PdfSaveOptions {
        PdfSaveOptions {
            image_optimization: Some(ImageOptimizationOptions {
                quality: Some(f32::from(self.jpeg_quality) / 100.0),
                max_image_size: None,
                dither_greyscale: Some(false),
                convert_to_greyscale: Some(false),
                auto_optimize: Some(false),
                format: Some(ImageCompression::Jpeg),
            }),
            ..Default::default()
        }
    }
}

/// Turns a snapshot into compressed image bytes `printpdf` can embed.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, snapshot: &RasterSnapshot) -> Result<Vec<u8>, PackagingError>;
}

/// Baseline JPEG; transparent pixels are composited onto white first.
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    pub quality: u8,
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImageEncoder for JpegEncoder {
    fn encode(&self, snapshot: &RasterSnapshot) -> Result<Vec<u8>, PackagingError> {
        let rgba = snapshot.pixels();
        let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = u16::from(a);
            let over_white = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            ::image::Rgb([over_white(r), over_white(g), over_white(b)])
        });
        let mut bytes = Vec::new();
        let encoder =
            ::image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut bytes), self.quality);
        DynamicImage::ImageRgb8(rgb)
            .write_with_encoder(encoder)
            .map_err(|e| PackagingError::Encode(e.to_string()))?;
        Ok(bytes)
    }
}

/// A finished PDF ready for delivery.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub file_name: String,
    pub geometry: PageGeometry,
    pub bytes: Vec<u8>,
}

pub struct Packager {
    encoder: Box<dyn ImageEncoder>,
    options: PackagingOptions,
}

impl Packager {
    pub fn new(options: PackagingOptions) -> Self {
        let encoder = JpegEncoder {
            quality: options.jpeg_quality,
        };
        Self::with_encoder(Box::new(encoder), options)
    }

    pub fn with_encoder(encoder: Box<dyn ImageEncoder>, options: PackagingOptions) -> Self {
        Self { encoder, options }
    }

    /// Encode `snapshot` and place it on a single page that it fills.
    /// The snapshot is dropped once the page is built.
    pub fn package(&self, snapshot: RasterSnapshot) -> Result<ExportDocument, PackagingError> {
        self.options.validate()?;
        let (px_width, px_height) = (snapshot.width(), snapshot.height());
        if px_width == 0 || px_height == 0 {
            return Err(PackagingError::EmptySnapshot);
        }
        let encoded = self.encoder.encode(&snapshot)?;
        drop(snapshot);

        let geometry = PageGeometry::for_snapshot(self.options.page_width_mm, px_width, px_height);
        let mut doc = PdfDocument::new(&self.options.title);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let raw = RawImage::decode_from_bytes(&encoded, &mut warnings)
            .map_err(|e| PackagingError::Encode(e.to_string()))?;
        let image_id = doc.add_image(&raw);

        // At dpi=72 printpdf renders 1 px = 1 pt, so scale = page_pt / px.
        let page_w_pt = geometry.width_mm * PT_PER_MM;
        let page_h_pt = geometry.height_mm * PT_PER_MM;
        let ops = vec![Op::UseXobject {
            id: image_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                dpi: Some(72.0),
                scale_x: Some((page_w_pt / f64::from(px_width)) as f32),
                scale_y: Some((page_h_pt / f64::from(px_height)) as f32),
                rotate: None,
            },
        }];

        let page = PdfPage::new(
            Mm(geometry.width_mm as f32),
            Mm(geometry.height_mm as f32),
            ops,
        );
        doc.with_pages(vec![page]);
        let bytes = doc.save(&self.options.save_options(), &mut warnings);
        if !bytes.starts_with(b"%PDF-") {
            return Err(PackagingError::Serialize(
                "writer produced no PDF header".to_string(),
            ));
        }
        for w in &warnings {
            log::debug!("pdf: {w:?}");
        }

        Ok(ExportDocument {
            file_name: self.options.file_name.clone(),
            geometry,
            bytes,
        })
    }
}
