//! Image asset resolution for `<img src>` references.
//!
//! Three kinds of source are recognised: inline `data:` URIs, same-origin
//! references (relative paths, `file://` URLs, or URLs under the document's
//! own origin) and cross-origin URLs. Cross-origin images are only fetched
//! when the capture allows it, and the loader may still refuse them.
//!
//! A failed image never fails the capture: it is logged and left out of the
//! returned map, so the layout keeps its box and the rasterizer paints it
//! blank.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::error::AssetError;
use crate::layout::ImageMap;

/// Fetches the bytes behind a non-inline image reference.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn fetch(&self, src: &str, origin: AssetOrigin) -> Result<Vec<u8>, AssetError>;
}

/// Where an image reference points relative to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOrigin {
    Inline,
    SameOrigin,
    CrossOrigin,
}

/// Classify `src` against the document origin (e.g. `https://me.dev`).
pub fn classify(src: &str, document_origin: Option<&str>) -> AssetOrigin {
    let src = src.trim();
    if src.starts_with("data:") {
        return AssetOrigin::Inline;
    }
    let is_remote = src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//");
    if !is_remote {
        return AssetOrigin::SameOrigin;
    }
    match document_origin {
        Some(origin) if same_origin(src, origin) => AssetOrigin::SameOrigin,
        _ => AssetOrigin::CrossOrigin,
    }
}

fn same_origin(src: &str, origin: &str) -> bool {
    let origin = origin.trim_end_matches('/');
    src.strip_prefix(origin)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}

/// Decode a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, AssetError> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::InvalidDataUri("missing `data:` scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::InvalidDataUri("missing `,` separator".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(AssetError::InvalidDataUri(
            "only base64 payloads are supported".to_string(),
        ));
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STD
        .decode(compact)
        .map_err(|e| AssetError::InvalidDataUri(e.to_string()))
}

/// Loader for files next to the résumé. It has no network client, so remote
/// references are reported unreachable and paint blank.
#[derive(Debug, Clone)]
pub struct LocalAssets {
    base_dir: PathBuf,
}

impl LocalAssets {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = src.strip_prefix("file://").unwrap_or(src);
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[async_trait]
impl AssetLoader for LocalAssets {
    async fn fetch(&self, src: &str, origin: AssetOrigin) -> Result<Vec<u8>, AssetError> {
        if origin == AssetOrigin::CrossOrigin || (src.contains("://") && !src.starts_with("file://")) {
            return Err(AssetError::Unreachable(src.to_string()));
        }
        let path = self.resolve(src);
        tokio::fs::read(&path).await.map_err(|e| AssetError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Policy knobs for one load pass.
#[derive(Debug, Clone, Copy)]
pub struct LoadPolicy<'a> {
    pub document_origin: Option<&'a str>,
    pub allow_cross_origin_images: bool,
    pub logging: bool,
}

/// Load and decode every distinct `src`. Failures are logged and skipped.
pub async fn load_images<'s>(
    srcs: impl IntoIterator<Item = &'s str>,
    loader: &dyn AssetLoader,
    policy: LoadPolicy<'_>,
) -> ImageMap {
    let unique: BTreeSet<&str> = srcs.into_iter().filter(|s| !s.trim().is_empty()).collect();
    let mut images = ImageMap::new();
    for src in unique {
        match load_one(src, loader, policy).await {
            Ok(img) => {
                if policy.logging {
                    log::debug!("loaded image {} ({}x{})", preview(src), img.width(), img.height());
                }
                images.insert(src.to_string(), Arc::new(img));
            }
            Err(e) => log::warn!("image painted blank: {e}"),
        }
    }
    images
}

async fn load_one(
    src: &str,
    loader: &dyn AssetLoader,
    policy: LoadPolicy<'_>,
) -> Result<image::RgbaImage, AssetError> {
    let origin = classify(src, policy.document_origin);
    let bytes = match origin {
        AssetOrigin::Inline => decode_data_uri(src)?,
        AssetOrigin::CrossOrigin if !policy.allow_cross_origin_images => {
            return Err(AssetError::CrossOriginBlocked(src.to_string()));
        }
        _ => loader.fetch(src, origin).await?,
    };
    image::load_from_memory(&bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| AssetError::Decode {
            src: preview(src),
            reason: e.to_string(),
        })
}

/// Data URIs can be huge; keep log lines short.
fn preview(src: &str) -> String {
    match src.char_indices().nth(64) {
        Some((idx, _)) => format!("{}…", &src[..idx]),
        None => src.to_string(),
    }
}
