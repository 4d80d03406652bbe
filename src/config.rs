//! Export configuration, loadable from JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::CaptureOptions;
use crate::error::ConfigError;
use crate::packaging::PackagingOptions;

/// Configuration for one export. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub capture: CaptureOptions,
    pub packaging: PackagingOptions,
    /// `id` of the element to capture.
    pub region_id: String,
    /// Directory the PDF is saved into.
    pub out_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            capture: CaptureOptions::default(),
            packaging: PackagingOptions::default(),
            region_id: "resume".to_string(),
            out_dir: PathBuf::from("."),
        }
    }
}

impl ExportConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}
