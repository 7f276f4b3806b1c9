//! Files crossing the upload and download boundaries.

use std::path::Path;

use pixmorph_core::OutputFormat;
use pixmorph_renderer::{EncodedImage, ImageFormat};

use crate::error::{StudioError, StudioResult};

/// A file handed to the studio by upload, drag-and-drop or chat attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    /// File name as shown to the user.
    pub name: String,
    /// MIME type reported for the file.
    pub mime: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl DroppedFile {
    /// Wrap file contents.
    #[must_use]
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, taking the MIME type from its extension and
    /// falling back to its leading bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Io`] if the file cannot be read.
    pub async fn read(path: &Path) -> StudioResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|source| StudioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mime = path
            .extension()
            .and_then(|ext| ImageFormat::from_extension(&ext.to_string_lossy()).as_output())
            .or_else(|| ImageFormat::from_magic_bytes(&bytes).as_output())
            .map_or("application/octet-stream", OutputFormat::mime);
        Ok(Self::new(name, mime, bytes))
    }

    /// Whether the file claims to be an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// View as encoded image bytes.
    #[must_use]
    pub fn to_encoded(&self) -> EncodedImage {
        EncodedImage::new(self.bytes.clone(), self.mime.clone())
    }
}

/// A named file ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Suggested file name.
    pub filename: String,
    /// Encoded contents.
    pub image: EncodedImage,
}

impl Download {
    /// Write into `dir` under the suggested name and return the full path.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Io`] if the file cannot be written.
    pub async fn save_to(&self, dir: &Path) -> StudioResult<std::path::PathBuf> {
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.image.bytes)
            .await
            .map_err(|source| StudioError::Io {
                path: path.display().to_string(),
                source,
            })?;
        tracing::info!("Saved {} ({} bytes)", path.display(), self.image.bytes.len());
        Ok(path)
    }
}
