//! Delivery sinks: where a finished PDF goes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::packaging::ExportDocument;

/// Where and how much was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub location: String,
    pub bytes: usize,
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, document: &ExportDocument) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Saves documents into a directory. The file only appears under its final
/// name once fully written.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DeliveryError + '_ {
    move |source| DeliveryError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    async fn deliver(&self, document: &ExportDocument) -> Result<DeliveryReceipt, DeliveryError> {
        let name = Path::new(&document.file_name);
        if name.file_name().map(Path::new) != Some(name) {
            return Err(DeliveryError::Rejected(format!(
                "`{}` is not a plain file name",
                document.file_name
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;
        let target = self.dir.join(name);
        let partial = self.dir.join(format!("{}.part", document.file_name));

        if let Err(e) = tokio::fs::write(&partial, &document.bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_err(&partial)(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_err(&target)(e));
        }

        let orientation = if document.geometry.is_portrait() {
            "portrait"
        } else {
            "landscape"
        };
        log::info!(
            "saved {} ({} bytes, {:.1} x {:.1} mm {orientation})",
            target.display(),
            document.bytes.len(),
            document.geometry.width_mm,
            document.geometry.height_mm
        );
        Ok(DeliveryReceipt {
            location: target.display().to_string(),
            bytes: document.bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packaging::PageGeometry;

    fn document(name: &str) -> ExportDocument {
        ExportDocument {
            file_name: name.to_string(),
            geometry: PageGeometry {
                width_mm: 210.0,
                height_mm: 297.0,
            },
            bytes: b"%PDF-1.7 test".to_vec(),
        }
    }

    #[tokio::test]
    async fn writes_into_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path().join("out/pdfs"));
        let receipt = sink
            .deliver(&document("Linson_Thomas_Resume.pdf"))
            .await
            .unwrap();
        let target = tmp.path().join("out/pdfs/Linson_Thomas_Resume.pdf");
        assert_eq!(receipt.location, target.display().to_string());
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7 test");
        assert!(!tmp.path().join("out/pdfs/Linson_Thomas_Resume.pdf.part").exists());
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path());
        let err = sink.deliver(&document("../escape.pdf")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(_)));
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = DirectorySink::new(blocker.join("sub"));
        let err = sink.deliver(&document("a.pdf")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Io { .. }));
    }
}
