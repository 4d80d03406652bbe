//! Error types for the export pipeline.
//!
//! Each stage has its own enum so the controller can tell which stage failed;
//! [`ExportError`] is the umbrella the controller logs.

use thiserror::Error;

/// Failures raised while turning a region into a bitmap.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// No region handle was supplied.
    #[error("no source region to capture")]
    RegionMissing,

    /// The region handle exists but is no longer mounted.
    #[error("source region `{0}` is detached")]
    Detached(String),

    /// The region resolves to `display: none`.
    #[error("source region `{0}` is not visible")]
    NotVisible(String),

    /// Layout produced a zero-sized region.
    #[error("source region has no area ({width}x{height} logical px)")]
    EmptyRegion { width: f32, height: f32 },

    /// The requested bitmap exceeds the surface limit.
    #[error("capture surface {width}x{height} exceeds the {max}px limit")]
    SurfaceTooLarge { width: u32, height: u32, max: u32 },

    /// The layout engine rejected the tree.
    #[error("layout failed: {0}")]
    Layout(String),

    /// The capture options are unusable (non-positive scale or width).
    #[error("invalid capture options: {0}")]
    InvalidOptions(String),
}

/// Failures raised while turning a bitmap into PDF bytes.
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("snapshot has no pixels")]
    EmptySnapshot,

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("PDF serialisation failed: {0}")]
    Serialize(String),

    #[error("invalid packaging options: {0}")]
    InvalidOptions(String),
}

/// Failures raised by a delivery sink.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("could not write `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Failures while loading an embedded asset. Never fatal to a capture: the
/// affected image is painted blank.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("cross-origin image `{0}` is not allowed")]
    CrossOriginBlocked(String),

    #[error("image `{0}` is unreachable")]
    Unreachable(String),

    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("image `{src}` could not be decoded: {reason}")]
    Decode { src: String, reason: String },

    #[error("could not read `{path}`: {reason}")]
    Io { path: String, reason: String },
}

/// Failures while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Any failure of one export run.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Packaging(#[from] PackagingError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ExportError {
    /// Name of the stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::Capture(_) => "capture",
            ExportError::Packaging(_) => "packaging",
            ExportError::Delivery(_) => "delivery",
        }
    }
}
