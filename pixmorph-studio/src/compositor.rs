//! Composition controller.
//!
//! Owns the layer store, the stage interaction and the decoded sources, and
//! orchestrates everything that crosses into a collaborator: background
//! removal, AI integration, chat routing and export. Every failing operation
//! leaves the store as it was and raises a notice.

use std::sync::Arc;

use pixmorph_core::{
    ChatIntent, IntentRouter, Layer, LayerId, LayerPatch, LayerStore, OutputFormat, Point,
    SourceKey, StageInteraction,
};
use pixmorph_renderer::{
    encode, EncodedImage, RasterOptions, SourceCache, StageRasterizer, TextureData,
};
use serde::{Deserialize, Serialize};

use crate::collaborators::{AiEditor, BackgroundRemover};
use crate::config::StudioConfig;
use crate::error::{Notice, NoticeSlot, StudioError, StudioResult};
use crate::file::{DroppedFile, Download};

/// File name for composition exports.
pub const EXPORT_FILENAME: &str = "composition.png";

/// Name given to layers produced by AI integration.
pub const AI_LAYER_NAME: &str = "ai-integration.png";

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person using the studio.
    User,
    /// The studio's replies.
    Assistant,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Message text.
    pub text: String,
    /// Names of attached images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl ChatMessage {
    fn user(text: &str, attachments: Vec<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.to_string(),
            attachments,
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// What a chat message ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Attachments were added as layers.
    Attached(Vec<LayerId>),
    /// A routed intent ran.
    Routed(ChatIntent),
}

/// Multi-layer composition controller.
pub struct CompositionController {
    store: LayerStore,
    stage: StageInteraction,
    rasterizer: StageRasterizer,
    cache: SourceCache,
    ai: Arc<dyn AiEditor>,
    remover: Arc<dyn BackgroundRemover>,
    router: IntentRouter,
    transcript: Vec<ChatMessage>,
    notices: NoticeSlot,
    export_pixel_ratio: f32,
    capture_pixel_ratio: f32,
}

impl CompositionController {
    /// Create an empty composition.
    #[must_use]
    pub fn new(
        config: &StudioConfig,
        ai: Arc<dyn AiEditor>,
        remover: Arc<dyn BackgroundRemover>,
    ) -> Self {
        Self {
            store: LayerStore::new(),
            stage: StageInteraction::new(config.stage),
            rasterizer: StageRasterizer::new(config.stage),
            cache: SourceCache::new(),
            ai,
            remover,
            router: IntentRouter::new(),
            transcript: Vec::new(),
            notices: NoticeSlot::default(),
            export_pixel_ratio: config.export_pixel_ratio,
            capture_pixel_ratio: config.capture_pixel_ratio,
        }
    }

    /// The layer store.
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Decoded sources.
    #[must_use]
    pub fn sources(&self) -> &SourceCache {
        &self.cache
    }

    /// Chat transcript, oldest first.
    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
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

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Decode a file and append it as the new top layer, selected.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Load`] if the file cannot be decoded.
    #[tracing::instrument(skip(self, file), fields(name = %file.name, bytes = file.bytes.len()))]
    pub fn add_layer(&mut self, file: &DroppedFile) -> StudioResult<LayerId> {
        let result = self.decode_into_layer(&file.bytes, &file.name);
        self.notices.track(result)
    }

    /// Add every image among `files` in order, skipping non-images.
    ///
    /// A file that fails to decode raises a notice and does not stop the rest.
    pub fn ingest_drop(&mut self, files: &[DroppedFile]) -> Vec<LayerId> {
        let mut added = Vec::new();
        for file in files {
            if !file.is_image() {
                tracing::debug!("Skipping dropped {} ({})", file.name, file.mime);
                continue;
            }
            if let Ok(id) = self.add_layer(file) {
                added.push(id);
            }
        }
        added
    }

    /// Set or clear the selection.
    pub fn select(&mut self, id: Option<LayerId>) {
        self.store.select(id);
    }

    /// Merge a patch into a layer. Sources no longer referenced are released.
    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) {
        let previous = self.store.get(id).map(|l| l.source);
        if let Some(source) = patch.source {
            if Some(source) != previous && !self.cache.retain(source) {
                tracing::warn!("Ignoring patch for layer {id}: unknown source {source}");
                return;
            }
        }
        let replaces_source = patch.source.is_some();
        self.store.update_layer(id, patch);
        if let (true, Some(old)) = (replaces_source, previous) {
            self.release_if_unused(old);
        }
    }

    /// Flip a layer's visibility. Hiding the selected layer deselects it.
    pub fn toggle_visibility(&mut self, id: LayerId) {
        if let Some(visible) = self.store.get(id).map(|l| l.visible) {
            self.store.update_layer(id, LayerPatch::visibility(!visible));
        }
    }

    /// Remove a layer and release its source when nothing else uses it.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let removed = self.store.remove_layer(id)?;
        self.release_if_unused(removed.source);
        tracing::info!("Deleted layer {id} ({})", removed.name);
        Some(removed)
    }

    /// Remove the selected layer.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::NoSelection`] when nothing is selected.
    pub fn delete_selected(&mut self) -> StudioResult<Layer> {
        let result = self
            .store
            .selected()
            .and_then(|id| self.remove_layer(id))
            .ok_or(StudioError::NoSelection);
        self.notices.track(result)
    }

    /// Keyboard shortcut: `Delete` or `Backspace` removes the selection.
    /// Returns whether a layer was removed.
    pub fn key_pressed(&mut self, key: &str) -> bool {
        if !matches!(key, "Delete" | "Backspace") {
            return false;
        }
        match self.store.selected() {
            Some(id) => self.remove_layer(id).is_some(),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    /// Pointer pressed on the stage.
    pub fn pointer_down(&mut self, p: Point) {
        self.stage.pointer_down(&mut self.store, p);
    }

    /// Pointer moved on the stage.
    pub fn pointer_move(&mut self, p: Point) {
        self.stage.pointer_move(p);
    }

    /// Pointer released. Returns the layer whose transform was committed.
    pub fn pointer_up(&mut self) -> Option<LayerId> {
        self.stage.pointer_up(&mut self.store).map(|(id, _)| id)
    }

    /// Render the stage as the user sees it, with the selection frame and
    /// any in-flight gesture.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterization fails.
    pub fn render_view(&self) -> StudioResult<TextureData> {
        let options = RasterOptions {
            pixel_ratio: 1.0,
            selection: self.store.selected(),
            preview: self.stage.preview(),
        };
        Ok(self.rasterizer.rasterize(&self.store, &self.cache, &options)?)
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    /// Replace a layer's pixels with a background-free version, keeping its
    /// identity, position and transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is missing, the service fails or its
    /// result cannot be decoded. The layer is untouched on error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_background(&mut self, id: LayerId) -> StudioResult<()> {
        let result = self.remove_background_inner(id).await;
        self.notices.track(result)
    }

    /// [`Self::remove_background`] on the selected layer.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::NoSelection`] when nothing is selected.
    pub async fn remove_background_selected(&mut self) -> StudioResult<()> {
        match self.store.selected() {
            Some(id) => self.remove_background(id).await,
            None => self.notices.track(Err(StudioError::NoSelection)),
        }
    }

    async fn remove_background_inner(&mut self, id: LayerId) -> StudioResult<()> {
        let layer = self
            .store
            .get(id)
            .ok_or_else(|| pixmorph_core::CoreError::LayerNotFound(id.to_string()))?;
        let (old_source, name) = (layer.source, layer.name.clone());
        let input = self.encode_source(old_source)?;

        let output = self
            .remover
            .remove_background(input)
            .await
            .map_err(StudioError::BackgroundRemoval)?;
        let texture = output.decode().map_err(|source| StudioError::Load {
            name: name.clone(),
            source,
        })?;

        let new_source = self.cache.insert(texture);
        self.store.update_layer(id, LayerPatch::source(new_source));
        self.release_if_unused(old_source);
        tracing::info!("Removed background of layer {id} ({name})");
        Ok(())
    }

    /// Capture the stage, send it with `prompt` to the AI editor and add the
    /// result as a new top layer.
    ///
    /// The selection is cleared first so no handles end up in the capture.
    ///
    /// # Errors
    ///
    /// Returns an error if capture, the service or decoding fails. No layer
    /// is added on error.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn ai_integrate(&mut self, prompt: &str) -> StudioResult<LayerId> {
        let result = self.ai_integrate_inner(prompt).await;
        self.notices.track(result)
    }

    async fn ai_integrate_inner(&mut self, prompt: &str) -> StudioResult<LayerId> {
        self.stage.cancel();
        self.store.select(None);

        let capture = self.rasterizer.rasterize(
            &self.store,
            &self.cache,
            &RasterOptions::at_ratio(self.capture_pixel_ratio),
        )?;
        let input = encode(&capture, OutputFormat::Png, 100)?;

        let output = self
            .ai
            .edit(input, prompt)
            .await
            .map_err(StudioError::AiService)?;

        let id = self.decode_into_layer(&output.bytes, AI_LAYER_NAME)?;
        tracing::info!("Added AI integration layer {id}");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Handle one chat message.
    ///
    /// Attachments are added as layers and the message is not routed.
    /// Otherwise the text is routed to an intent which then runs. Both
    /// paths append an assistant reply to the transcript.
    ///
    /// # Errors
    ///
    /// Returns the error of the routed operation.
    pub async fn send_chat(&mut self, text: &str, attachments: &[DroppedFile]) -> StudioResult<ChatOutcome> {
        let names = attachments.iter().map(|f| f.name.clone()).collect();
        self.transcript.push(ChatMessage::user(text, names));

        if !attachments.is_empty() {
            let added = self.ingest_drop(attachments);
            let reply = format!("Added {} image(s) to the canvas.", added.len());
            self.transcript.push(ChatMessage::assistant(reply));
            return Ok(ChatOutcome::Attached(added));
        }

        let intent = self.router.route(text);
        tracing::debug!("Routed chat message to {intent:?}");
        let result = match &intent {
            ChatIntent::RemoveBackground => self
                .remove_background_selected()
                .await
                .map(|()| "Background removed.".to_string()),
            ChatIntent::DeleteSelection => self
                .delete_selected()
                .map(|layer| format!("Deleted {}.", layer.name)),
            ChatIntent::Generate(prompt) => self
                .ai_integrate(prompt)
                .await
                .map(|_| "Done! I added the result as a new layer.".to_string()),
        };

        match result {
            Ok(reply) => {
                self.transcript.push(ChatMessage::assistant(reply));
                Ok(ChatOutcome::Routed(intent))
            }
            Err(e) => {
                self.transcript
                    .push(ChatMessage::assistant(e.user_message()));
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Flatten the stage at the export pixel ratio into a PNG download.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterization or encoding fails.
    #[tracing::instrument(skip(self))]
    pub fn export(&mut self) -> StudioResult<Download> {
        let result = self.export_inner();
        self.notices.track(result)
    }

    fn export_inner(&self) -> StudioResult<Download> {
        let pixels = self.rasterizer.rasterize(
            &self.store,
            &self.cache,
            &RasterOptions::at_ratio(self.export_pixel_ratio),
        )?;
        let image = encode(&pixels, OutputFormat::Png, 100)?;
        tracing::info!(
            "Exported {} layer(s) at {}x{}",
            self.store.len(),
            pixels.width,
            pixels.height
        );
        Ok(Download {
            filename: EXPORT_FILENAME.to_string(),
            image,
        })
    }

    /// JSON snapshot of the layer store.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn snapshot(&self) -> StudioResult<String> {
        Ok(self.store.to_json()?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn decode_into_layer(&mut self, bytes: &[u8], name: &str) -> StudioResult<LayerId> {
        let texture =
            pixmorph_renderer::load_image_from_bytes(bytes).map_err(|source| StudioError::Load {
                name: name.to_string(),
                source,
            })?;
        let size = texture.size();
        let source = self.cache.insert(texture);
        Ok(self.store.add_layer(Layer::new(source, size, name)))
    }

    fn encode_source(&self, key: SourceKey) -> StudioResult<EncodedImage> {
        let texture = self
            .cache
            .peek(key)
            .ok_or_else(|| pixmorph_renderer::RenderError::MissingSource(key.to_string()))?;
        Ok(encode(texture, OutputFormat::Png, 100)?)
    }

    fn release_if_unused(&mut self, key: SourceKey) {
        while !self.store.references_source(key) && self.cache.contains(key) {
            self.cache.release(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, Unconfigured};
    use pixmorph_renderer::image::create_solid_color;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        encode(&create_solid_color(width, height, rgba), OutputFormat::Png, 100)
            .expect("png")
            .bytes
    }

    fn file(name: &str, size: u32) -> DroppedFile {
        DroppedFile::new(name, "image/png", png(size, size, [200, 0, 0, 255]))
    }

    fn controller() -> CompositionController {
        CompositionController::new(
            &StudioConfig::default(),
            Arc::new(Unconfigured),
            Arc::new(Unconfigured),
        )
    }

    #[test]
    fn test_drop_filters_non_images() {
        let mut c = controller();
        let added = c.ingest_drop(&[
            file("a.png", 10),
            DroppedFile::new("notes.txt", "text/plain", b"hi".to_vec()),
            file("b.png", 10),
        ]);
        assert_eq!(added.len(), 2);
        let names: Vec<_> = c.store().layers().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(c.store().selected(), Some(added[1]));
    }

    #[test]
    fn test_undecodable_file_raises_notice() {
        let mut c = controller();
        let err = c
            .add_layer(&DroppedFile::new("bad.png", "image/png", b"nope".to_vec()))
            .expect_err("bad");
        assert!(matches!(err, StudioError::Load { .. }));
        assert!(c.store().is_empty());
        assert!(c.notice().is_some());
        assert!(c.dismiss_notice().is_some());
        assert!(c.notice().is_none());
    }

    #[test]
    fn test_delete_releases_source() {
        let mut c = controller();
        let id = c.add_layer(&file("a.png", 4)).expect("add");
        assert_eq!(c.sources().len(), 1);

        assert!(c.key_pressed("Delete"));
        assert!(c.store().is_empty());
        assert!(c.sources().is_empty());
        assert!(!c.key_pressed("Delete"));
        assert!(c.store().get(id).is_none());
    }

    #[test]
    fn test_delete_without_selection_is_reported() {
        let mut c = controller();
        c.add_layer(&file("a.png", 4)).expect("add");
        c.select(None);
        let err = c.delete_selected().expect_err("no selection");
        assert!(matches!(err, StudioError::NoSelection));
        assert_eq!(c.store().len(), 1);
    }

    #[test]
    fn test_hidden_layer_is_deselected() {
        let mut c = controller();
        let id = c.add_layer(&file("a.png", 4)).expect("add");
        c.toggle_visibility(id);
        assert_eq!(c.store().selected(), None);
        c.select(Some(id));
        assert_eq!(c.store().selected(), None);
        c.toggle_visibility(id);
        assert!(c.store().get(id).expect("layer").visible);
    }

    #[test]
    fn test_export_is_named_png_at_double_ratio() {
        let mut c = controller();
        c.add_layer(&file("a.png", 10)).expect("add");
        let download = c.export().expect("export");
        assert_eq!(download.filename, EXPORT_FILENAME);
        let decoded = download.image.decode().expect("decode");
        assert_eq!((decoded.width, decoded.height), (1600, 1200));
    }

    #[test]
    fn test_pointer_drag_commits_on_release() {
        let mut c = controller();
        let id = c.add_layer(&file("a.png", 100)).expect("add");
        c.select(None);
        c.pointer_down(Point::new(60.0, 60.0));
        c.pointer_move(Point::new(80.0, 90.0));
        assert_eq!(c.store().get(id).expect("layer").x, 50.0);
        assert!(c.render_view().is_ok());
        assert_eq!(c.pointer_up(), Some(id));
        let layer = c.store().get(id).expect("layer");
        assert_eq!((layer.x, layer.y), (70.0, 80.0));
    }

    #[tokio::test]
    async fn test_unconfigured_background_removal_leaves_layer() {
        let mut c = controller();
        let id = c.add_layer(&file("a.png", 4)).expect("add");
        let before = c.store().get(id).cloned();

        let err = c.remove_background(id).await.expect_err("unconfigured");
        match err {
            StudioError::BackgroundRemoval(CollaboratorError::NotConfigured(_)) => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(c.store().get(id).cloned(), before);
        assert_eq!(
            c.notice().map(|n| n.message.as_str()),
            Some("Error removing background.")
        );
    }

    #[tokio::test]
    async fn test_chat_delete_routes_and_replies() {
        let mut c = controller();
        c.add_layer(&file("a.png", 4)).expect("add");
        let outcome = c.send_chat("please delete this", &[]).await.expect("chat");
        assert_eq!(outcome, ChatOutcome::Routed(ChatIntent::DeleteSelection));
        assert!(c.store().is_empty());
        assert_eq!(c.transcript().len(), 2);
        assert_eq!(c.transcript()[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_chat_attachments_become_layers() {
        let mut c = controller();
        let outcome = c
            .send_chat("I added this image", &[file("cat.png", 4)])
            .await
            .expect("chat");
        assert!(matches!(outcome, ChatOutcome::Attached(ref ids) if ids.len() == 1));
        assert_eq!(c.transcript()[0].attachments, vec!["cat.png".to_string()]);
    }
}
