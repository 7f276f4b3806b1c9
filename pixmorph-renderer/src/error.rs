//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while decoding, rasterizing or encoding.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Input bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// A data URI was malformed.
    #[error("Invalid data URI: {0}")]
    DataUri(String),

    /// A drawing surface could not be allocated (zero or oversized area).
    #[error("Could not create drawing surface: {0}")]
    Surface(String),

    /// Encoding to the requested output format failed.
    #[error("Failed to encode {format}: {reason}")]
    Encode {
        /// Target format.
        format: String,
        /// Encoder message.
        reason: String,
    },

    /// A layer references pixels that are not in the source cache.
    #[error("Missing source: {0}")]
    MissingSource(String),
}
