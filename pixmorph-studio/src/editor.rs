//! Single-image editor controller.
//!
//! Upload one image, resize/convert it locally or send it to the AI editor,
//! then download the result. Edits compose: each one starts from the current
//! processed image. Uploading again discards everything about the old image.

use std::sync::Arc;

use pixmorph_core::{
    Dimension, EditMode, EditorAction, EditorPhase, EditorState, OutputFormat, PixelSize,
    ResizeOptions, SourceKey,
};
use pixmorph_renderer::{
    data_uri_size, format_file_size, load_image_from_bytes, process_image_locally, transcode,
    EncodedImage, SourceCache,
};

use crate::collaborators::AiEditor;
use crate::error::{Notice, NoticeSlot, StudioError, StudioResult};
use crate::file::{DroppedFile, Download};

/// Single-image editor controller.
pub struct SingleImageEditor {
    state: EditorState,
    cache: SourceCache,
    /// Encoded form of the processed image, as the user would download it.
    processed_file: Option<EncodedImage>,
    ai: Arc<dyn AiEditor>,
    notices: NoticeSlot,
}

impl SingleImageEditor {
    /// Create an empty editor.
    #[must_use]
    pub fn new(ai: Arc<dyn AiEditor>) -> Self {
        Self {
            state: EditorState::new(),
            cache: SourceCache::new(),
            processed_file: None,
            ai,
            notices: NoticeSlot::default(),
        }
    }

    /// Editor state.
    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Current resize/convert settings.
    #[must_use]
    pub fn options(&self) -> &ResizeOptions {
        &self.state.options
    }

    /// Coarse phase.
    #[must_use]
    pub fn phase(&self) -> EditorPhase {
        self.state.phase()
    }

    /// Decoded sources.
    #[must_use]
    pub fn sources(&self) -> &SourceCache {
        &self.cache
    }

    /// The notice on display, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notices.current()
    }

    /// Dismiss the notice on display.
    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notices.dismiss()
    }

    /// Size of the processed image.
    #[must_use]
    pub fn processed_size(&self) -> Option<PixelSize> {
        self.state.image().map(|img| img.processed_size)
    }

    /// The processed image as a data URI.
    #[must_use]
    pub fn processed_data_uri(&self) -> Option<String> {
        self.processed_file.as_ref().map(EncodedImage::to_data_uri)
    }

    /// Human readable size of the processed image, measured from its data URI.
    #[must_use]
    pub fn processed_file_size(&self) -> Option<String> {
        self.processed_data_uri()
            .map(|uri| format_file_size(data_uri_size(&uri) as u64))
    }

    /// Load a new image, resetting the options to its native size.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Load`] if the file cannot be decoded. The
    /// previous image stays loaded on error.
    #[tracing::instrument(skip(self, file), fields(name = %file.name, bytes = file.bytes.len()))]
    pub fn upload(&mut self, file: &DroppedFile) -> StudioResult<PixelSize> {
        let result = self.upload_inner(file);
        self.notices.track(result)
    }

    fn upload_inner(&mut self, file: &DroppedFile) -> StudioResult<PixelSize> {
        let texture = load_image_from_bytes(&file.bytes).map_err(|source| StudioError::Load {
            name: file.name.clone(),
            source,
        })?;
        let size = texture.size();

        let previous = self.state.image().map(|img| (img.original, img.processed));
        let source = self.cache.insert(texture);
        self.state.apply(EditorAction::Load {
            name: file.name.clone(),
            source,
            size,
        })?;
        self.processed_file = Some(file.to_encoded());

        if let Some((original, processed)) = previous {
            self.cache.release(original);
            if processed != original {
                self.cache.release(processed);
            }
        }
        tracing::info!("Loaded {} at {size}", file.name);
        Ok(size)
    }

    /// Apply an option or mode change.
    ///
    /// # Errors
    ///
    /// Returns an error if the aspect lock cannot derive the other side.
    pub fn dispatch(&mut self, action: EditorAction) -> StudioResult<()> {
        let result = self.state.apply(action).map_err(StudioError::from);
        self.notices.track(result)
    }

    /// Switch the active tab.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn set_mode(&mut self, mode: EditMode) -> StudioResult<()> {
        self.dispatch(EditorAction::SetMode(mode))
    }

    /// Edit one side of the target size.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn set_dimension(&mut self, side: Dimension, value: u32) -> StudioResult<()> {
        self.dispatch(EditorAction::SetDimension(side, value))
    }

    /// Toggle the aspect lock.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn set_aspect_lock(&mut self, locked: bool) -> StudioResult<()> {
        self.dispatch(EditorAction::SetAspectLock(locked))
    }

    /// Set output quality (clamped to 0..=1 by the reducer).
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn set_quality(&mut self, quality: f32) -> StudioResult<()> {
        self.dispatch(EditorAction::SetQuality(quality))
    }

    /// Set output encoding.
    ///
    /// # Errors
    ///
    /// See [`Self::dispatch`].
    pub fn set_format(&mut self, format: OutputFormat) -> StudioResult<()> {
        self.dispatch(EditorAction::SetFormat(format))
    }

    /// Resize and convert the processed image with the current options.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::NoImage`] with nothing loaded, or a render
    /// error. The processed image is unchanged on error.
    #[tracing::instrument(skip(self))]
    pub fn apply_local(&mut self) -> StudioResult<PixelSize> {
        let result = self.apply_local_inner();
        self.notices.track(result)
    }

    fn apply_local_inner(&mut self) -> StudioResult<PixelSize> {
        let base = self.state.edit_base().ok_or(StudioError::NoImage)?;
        let texture = self
            .cache
            .peek(base)
            .ok_or_else(|| pixmorph_renderer::RenderError::MissingSource(base.to_string()))?;

        let encoded = process_image_locally(texture, &self.state.options)?;
        let decoded = encoded.decode()?;

        let source = self.cache.insert(decoded);
        self.state.apply(EditorAction::ApplyLocal { source })?;
        self.processed_file = Some(encoded);
        self.release_replaced(base);

        let size = self.state.options.size();
        tracing::info!("Applied local edit at {size}");
        Ok(size)
    }

    /// Send the processed image and `prompt` to the AI editor and make the
    /// result the processed image.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::NoImage`] with nothing loaded,
    /// [`StudioError::AiService`] if the service fails, or
    /// [`StudioError::Load`] if its result cannot be decoded.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn ai_edit(&mut self, prompt: &str) -> StudioResult<PixelSize> {
        let result = self.ai_edit_inner(prompt).await;
        self.notices.track(result)
    }

    async fn ai_edit_inner(&mut self, prompt: &str) -> StudioResult<PixelSize> {
        let base = self.state.edit_base().ok_or(StudioError::NoImage)?;
        let input = self.processed_file.clone().ok_or(StudioError::NoImage)?;
        let name = self
            .state
            .image()
            .map(|img| img.name.clone())
            .unwrap_or_default();

        let output = self
            .ai
            .edit(input, prompt)
            .await
            .map_err(StudioError::AiService)?;
        let texture = output
            .decode()
            .map_err(|source| StudioError::Load { name, source })?;
        let size = texture.size();

        let source = self.cache.insert(texture);
        self.state.apply(EditorAction::ApplyAi { source, size })?;
        self.processed_file = Some(output);
        self.release_replaced(base);

        tracing::info!("Applied AI edit, result {size}");
        Ok(size)
    }

    /// The processed image, encoded in the selected format, with its
    /// download name.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::NoImage`] with nothing loaded, or an encode
    /// error.
    pub fn download(&mut self) -> StudioResult<Download> {
        let result = self.download_inner();
        self.notices.track(result)
    }

    fn download_inner(&self) -> StudioResult<Download> {
        let filename = self.state.download_name().ok_or(StudioError::NoImage)?;
        let processed = self.processed_file.as_ref().ok_or(StudioError::NoImage)?;
        let options = &self.state.options;
        let image = transcode(processed, options.format, options.quality_percent())?;
        Ok(Download { filename, image })
    }

    /// Drop the pixels an edit replaced, unless they are the original.
    fn release_replaced(&mut self, key: SourceKey) {
        let is_original = self.state.image().is_some_and(|img| img.original == key);
        if !is_original {
            self.cache.release(key);
        }
    }
}
