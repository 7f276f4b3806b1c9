//! Controller errors and the user-facing notice slot.

use pixmorph_core::CoreError;
use pixmorph_renderer::RenderError;
use thiserror::Error;

use crate::collaborators::CollaboratorError;

/// Result type for controller operations.
pub type StudioResult<T> = Result<T, StudioError>;

/// Errors surfaced by the controllers.
#[derive(Debug, Error)]
pub enum StudioError {
    /// An uploaded or returned file could not be read or decoded.
    #[error("failed to load {name}: {source}")]
    Load {
        /// File name.
        name: String,
        /// Decoder error.
        #[source]
        source: RenderError,
    },

    /// Local rasterization or encoding failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The AI edit service failed.
    #[error("AI edit failed: {0}")]
    AiService(#[source] CollaboratorError),

    /// The background removal service failed.
    #[error("background removal failed: {0}")]
    BackgroundRemoval(#[source] CollaboratorError),

    /// A model invariant rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The operation needs a selected layer.
    #[error("no layer is selected")]
    NoSelection,

    /// The operation needs an uploaded image.
    #[error("no image is loaded")]
    NoImage,

    /// Writing a download failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Target path.
        path: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },
}

impl StudioError {
    /// Message shown to the user for this error's class.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Load { .. } => "Could not load the image. Please try again.",
            Self::Render(_) => "Could not process the image locally.",
            Self::AiService(_) => {
                "The AI could not process your request. Check your API key or try another prompt."
            }
            Self::BackgroundRemoval(_) => "Error removing background.",
            Self::Core(_) => "That change could not be applied.",
            Self::NoSelection => "Select a layer first.",
            Self::NoImage => "Upload an image first.",
            Self::Io { .. } => "Could not save the file.",
        }
    }
}

/// A dismissible message shown after a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Text for the user.
    pub message: String,
    /// Underlying error, for logs and detail views.
    pub detail: String,
}

impl Notice {
    /// Build a notice from an error.
    #[must_use]
    pub fn from_error(error: &StudioError) -> Self {
        Self {
            message: error.user_message().to_string(),
            detail: error.to_string(),
        }
    }
}

/// Holds at most one [`Notice`]. A new failure replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct NoticeSlot {
    current: Option<Notice>,
}

impl NoticeSlot {
    /// The notice on display, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    /// Record a failure.
    pub fn raise(&mut self, error: &StudioError) {
        tracing::warn!("{error}");
        self.current = Some(Notice::from_error(error));
    }

    /// Dismiss the notice.
    pub fn dismiss(&mut self) -> Option<Notice> {
        self.current.take()
    }

    /// Pass a result through, recording its error if any.
    ///
    /// # Errors
    ///
    /// Returns the error unchanged after recording it.
    pub fn track<T>(&mut self, result: StudioResult<T>) -> StudioResult<T> {
        if let Err(e) = &result {
            self.raise(e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_follow_error_class() {
        let ai = StudioError::AiService(CollaboratorError::Service("quota".into()));
        assert!(ai.user_message().contains("AI"));
        assert!(ai.to_string().contains("quota"));

        let bg = StudioError::BackgroundRemoval(CollaboratorError::NotConfigured("background removal"));
        assert_eq!(bg.user_message(), "Error removing background.");

        let load = StudioError::Load {
            name: "a.png".into(),
            source: RenderError::Decode("bad".into()),
        };
        assert!(load.user_message().starts_with("Could not load"));
    }

    #[test]
    fn test_notice_slot_tracks_and_dismisses() {
        let mut slot = NoticeSlot::default();
        let ok: StudioResult<u8> = slot.track(Ok(1));
        assert_eq!(ok.ok(), Some(1));
        assert!(slot.current().is_none());

        let _ = slot.track::<()>(Err(StudioError::NoSelection));
        assert_eq!(
            slot.current().map(|n| n.message.as_str()),
            Some("Select a layer first.")
        );

        let dismissed = slot.dismiss().expect("notice");
        assert_eq!(dismissed.detail, "no layer is selected");
        assert!(slot.current().is_none());
    }
}
