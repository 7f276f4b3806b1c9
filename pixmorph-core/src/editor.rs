//! Single-image editor state.
//!
//! One image at a time, no layers:
//!
//! ```text
//! Empty ──load──► Loaded ──local──► Edited { resized }
//!                   │                 │  ▲
//!                   └──ai──► Edited { ai_edited } ◄─┘
//! ```
//!
//! Edits compose: each one starts from the current processed image. Loading
//! a new file discards every edit made to the previous one.

use serde::{Deserialize, Serialize};

use crate::geometry::{aspect_locked_size, Dimension, PixelSize};
use crate::layer::SourceKey;
use crate::{CoreError, CoreResult};

/// Encodings the editor and compositor can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
    /// WebP image.
    WebP,
    /// GIF image.
    Gif,
    /// SVG document wrapping an embedded PNG.
    Svg,
}

impl OutputFormat {
    /// Every output format.
    pub const ALL: [Self; 5] = [Self::Png, Self::Jpeg, Self::WebP, Self::Gif, Self::Svg];

    /// MIME type.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
        }
    }

    /// File extension used for downloads.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Svg => "svg",
        }
    }

    /// Parse a MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            "image/svg+xml" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Parse a file extension or short name (`jpg`, `PNG`, ...).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Whether the encoding keeps an alpha channel. Formats without one get
    /// an opaque backdrop before encoding.
    #[must_use]
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .or_else(|| Self::from_mime(s))
            .ok_or_else(|| CoreError::InvalidState(format!("unknown output format: {s}")))
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resize and conversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResizeOptions {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Keep the original aspect ratio when one side changes.
    pub maintain_aspect_ratio: bool,
    /// Lossy quality from 0 to 1.
    pub quality: f32,
    /// Output encoding.
    pub format: OutputFormat,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            maintain_aspect_ratio: true,
            quality: 0.9,
            format: OutputFormat::Jpeg,
        }
    }
}

impl ResizeOptions {
    /// Target size.
    #[must_use]
    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    /// Quality as an encoder percentage in `1..=100`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn quality_percent(&self) -> u8 {
        (self.quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Edit one side, deriving the other from `original` when locked.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDimensions`] if locked and `original` is empty.
    pub fn set_dimension(&mut self, original: PixelSize, edited: Dimension, value: u32) -> CoreResult<()> {
        if self.maintain_aspect_ratio {
            let size = aspect_locked_size(original, edited, value)?;
            self.width = size.width;
            self.height = size.height;
        } else {
            match edited {
                Dimension::Width => self.width = value,
                Dimension::Height => self.height = value,
            }
        }
        Ok(())
    }
}

/// Which kind of edit produced the processed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Local resize/convert.
    Local,
    /// Remote AI edit.
    Ai,
}

impl EditMode {
    /// Suffix appended to the download name.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Local => "-processed",
            Self::Ai => "-ai-remix",
        }
    }
}

/// Coarse editor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    /// No image uploaded.
    Empty,
    /// Image uploaded, nothing applied.
    Loaded,
    /// At least one edit applied.
    Edited {
        /// A local resize/convert was applied.
        resized: bool,
        /// An AI edit was applied.
        ai_edited: bool,
    },
}

/// The one image being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageState {
    /// Uploaded file name.
    pub name: String,
    /// Pixels as uploaded.
    pub original: SourceKey,
    /// Natural size of the upload.
    pub original_size: PixelSize,
    /// Current result; equals `original` until an edit is applied.
    pub processed: SourceKey,
    /// Size of the current result.
    pub processed_size: PixelSize,
    /// Edits applied so far, oldest first.
    pub edits: Vec<EditMode>,
}

/// A transition of the editor state.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    /// A file finished decoding.
    Load {
        /// File name.
        name: String,
        /// Decoded pixels.
        source: SourceKey,
        /// Natural size.
        size: PixelSize,
    },
    /// A local resize/convert finished.
    ApplyLocal {
        /// Result pixels.
        source: SourceKey,
    },
    /// An AI edit finished.
    ApplyAi {
        /// Result pixels.
        source: SourceKey,
        /// Result size.
        size: PixelSize,
    },
    /// Switch the active tab.
    SetMode(EditMode),
    /// Edit one side of the target size.
    SetDimension(Dimension, u32),
    /// Toggle the aspect lock.
    SetAspectLock(bool),
    /// Change output quality.
    SetQuality(f32),
    /// Change output encoding.
    SetFormat(OutputFormat),
}

/// Full single-image editor state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    image: Option<ImageState>,
    /// Current resize/convert settings.
    pub options: ResizeOptions,
    /// Active tab; names the download when no edit has been applied yet.
    pub mode: Option<EditMode>,
}

impl EditorState {
    /// Create an empty editor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded image, if any.
    #[must_use]
    pub fn image(&self) -> Option<&ImageState> {
        self.image.as_ref()
    }

    /// Coarse phase derived from the edit history.
    #[must_use]
    pub fn phase(&self) -> EditorPhase {
        match &self.image {
            None => EditorPhase::Empty,
            Some(img) if img.edits.is_empty() => EditorPhase::Loaded,
            Some(img) => EditorPhase::Edited {
                resized: img.edits.contains(&EditMode::Local),
                ai_edited: img.edits.contains(&EditMode::Ai),
            },
        }
    }

    /// Pixels the next edit starts from.
    #[must_use]
    pub fn edit_base(&self) -> Option<SourceKey> {
        self.image.as_ref().map(|img| img.processed)
    }

    /// Pure transition.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] when an edit arrives with no image
    /// loaded, or a dimension error from the aspect lock.
    pub fn reduce(mut self, action: EditorAction) -> CoreResult<Self> {
        self.apply(action)?;
        Ok(self)
    }

    /// Apply a transition in place. On error the state is unchanged.
    ///
    /// # Errors
    ///
    /// See [`EditorState::reduce`].
    pub fn apply(&mut self, action: EditorAction) -> CoreResult<()> {
        match action {
            EditorAction::Load { name, source, size } => {
                tracing::debug!("Loaded {name} at {size}");
                self.image = Some(ImageState {
                    name,
                    original: source,
                    original_size: size,
                    processed: source,
                    processed_size: size,
                    edits: Vec::new(),
                });
                self.options.width = size.width;
                self.options.height = size.height;
            }
            EditorAction::ApplyLocal { source } => {
                let size = self.options.size();
                let img = self.image_mut()?;
                img.processed = source;
                img.processed_size = size;
                img.edits.push(EditMode::Local);
            }
            EditorAction::ApplyAi { source, size } => {
                let img = self.image_mut()?;
                img.processed = source;
                img.processed_size = size;
                img.edits.push(EditMode::Ai);
                self.options.width = size.width;
                self.options.height = size.height;
            }
            EditorAction::SetMode(mode) => self.mode = Some(mode),
            EditorAction::SetDimension(edited, value) => {
                let original = self
                    .image
                    .as_ref()
                    .map_or(self.options.size(), |img| img.original_size);
                let mut options = self.options;
                options.set_dimension(original, edited, value)?;
                self.options = options;
            }
            EditorAction::SetAspectLock(locked) => self.options.maintain_aspect_ratio = locked,
            EditorAction::SetQuality(quality) => self.options.quality = quality.clamp(0.0, 1.0),
            EditorAction::SetFormat(format) => self.options.format = format,
        }
        Ok(())
    }

    /// Name for downloading the processed image.
    ///
    /// The suffix follows the most recent edit, falling back to the active
    /// tab, then to a local edit.
    #[must_use]
    pub fn download_name(&self) -> Option<String> {
        let img = self.image.as_ref()?;
        let mode = img
            .edits
            .last()
            .copied()
            .or(self.mode)
            .unwrap_or(EditMode::Local);
        Some(download_name(&img.name, mode, self.options.format))
    }

    fn image_mut(&mut self) -> CoreResult<&mut ImageState> {
        self.image
            .as_mut()
            .ok_or_else(|| CoreError::InvalidState("no image loaded".to_string()))
    }
}

/// Strip the extension from `original`, append the mode suffix and the
/// extension of `format`. Names without a usable stem are kept whole.
#[must_use]
pub fn download_name(original: &str, mode: EditMode, format: OutputFormat) -> String {
    let stem = match original.rfind('.') {
        Some(idx) if idx > 0 => &original[..idx],
        _ => original,
    };
    format!("{stem}{}.{}", mode.suffix(), format.extension())
}
