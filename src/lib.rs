//! # resume-export – capture a résumé region and package it as a PDF
//!
//! The export runs in two stages driven by a controller:
//!
//! 1. **Capture** – lay the region out at a fixed logical width and
//!    rasterize it at a fixed scale ([`capture`]). The region itself is
//!    résumé markup parsed ([`dom`]), styled ([`style`]) and laid out with
//!    Taffy ([`layout`]) into a [`display_list`], then painted ([`raster`]).
//! 2. **Package** – JPEG-encode the bitmap and place it on a single page
//!    210 mm wide whose height follows the bitmap's aspect ratio
//!    ([`packaging`]).
//!
//! [`controller`] owns the trigger's busy/idle state and hands the finished
//! document to a [`delivery`] sink.

pub mod assets;
pub mod capture;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod display_list;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod packaging;
pub mod raster;
pub mod region;
pub mod style;

// Re-exports for convenience
pub use capture::{capture, CaptureOptions, RasterSnapshot, Viewport};
pub use config::ExportConfig;
pub use controller::{ExportController, ExportState, TriggerControl, TriggerOutcome};
pub use error::ExportError;
pub use packaging::{ExportDocument, Packager, PageGeometry};
pub use region::{MarkupRegion, SourceRegion};
