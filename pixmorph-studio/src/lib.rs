//! # PixMorph Studio
//!
//! Controllers for the two PixMorph views and the services they call.
//!
//! This crate drives the pure model in `pixmorph-core` and the pixel code in
//! `pixmorph-renderer`, and talks to the outside world: uploads, downloads,
//! the AI edit service and the background removal service.
//!
//! ## Usage
//!
//! ```bash
//! pixmorph resize photo.png --width 600 --format jpg
//! PIXMORPH_AI_URL=http://localhost:9000/edit pixmorph ai-edit photo.png --prompt "make it night"
//! pixmorph compose sky.png person.png --say "remove the background"
//! ```
//!
//! ## Architecture
//!
//! - `CompositionController` - layers, stage gestures, chat routing, export
//! - `SingleImageEditor` - upload, local resize/convert, AI edit, download
//! - `AiEditor` / `BackgroundRemover` - async service traits with HTTP clients
//! - `StudioError` / `NoticeSlot` - failures turned into dismissible notices
//! - `CliArgs` / `StudioConfig` - command line and configuration

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collaborators;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod file;

pub use collaborators::{
    AiEditor, BackgroundRemover, CollaboratorError, HttpAiEditor, HttpBackgroundRemover,
    Unconfigured,
};
pub use compositor::{ChatMessage, ChatOutcome, ChatRole, CompositionController, EXPORT_FILENAME};
pub use config::{CliArgs, Command, StudioConfig};
pub use editor::SingleImageEditor;
pub use error::{Notice, NoticeSlot, StudioError, StudioResult};
pub use file::{Download, DroppedFile};

use std::sync::Arc;

/// Build the AI editor named by `config`, or [`Unconfigured`] without a URL.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the HTTP client cannot be built.
pub fn ai_editor_from_config(config: &StudioConfig) -> Result<Arc<dyn AiEditor>, CollaboratorError> {
    let editor: Arc<dyn AiEditor> = match &config.ai_url {
        Some(url) => Arc::new(HttpAiEditor::new(url, config.api_key.clone(), config.timeout)?),
        None => Arc::new(Unconfigured),
    };
    Ok(editor)
}

/// Build the background remover named by `config`, or [`Unconfigured`]
/// without a URL.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the HTTP client cannot be built.
pub fn background_remover_from_config(
    config: &StudioConfig,
) -> Result<Arc<dyn BackgroundRemover>, CollaboratorError> {
    let remover: Arc<dyn BackgroundRemover> = match &config.bg_url {
        Some(url) => Arc::new(HttpBackgroundRemover::new(url, None, config.timeout)?),
        None => Arc::new(Unconfigured),
    };
    Ok(remover)
}
