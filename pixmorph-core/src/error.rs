//! Error types for core model operations.

use thiserror::Error;

/// Result type for core model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Layer not found in the store.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Dimensions were zero, negative or not finite.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Store serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
