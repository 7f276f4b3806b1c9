//! # PixMorph Core
//!
//! Pure model for the PixMorph studio. Nothing in here touches pixels, files
//! or the network; every mutation is an explicit state transition so the
//! controllers above it can be tested without a display.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                pixmorph-core                │
//! ├─────────────────────────────────────────────┤
//! │  Layer Store     │  Stage Interaction       │
//! │  - Layers        │  - Hit testing           │
//! │  - Selection     │  - Drag / resize / turn  │
//! │  - Paint order   │  - Commit on release     │
//! ├─────────────────────────────────────────────┤
//! │  Editor State    │  Intent Router           │
//! │  - Resize opts   │  - Chat keyword rules    │
//! │  - Edit history  │  - Generative fallback   │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod editor;
pub mod error;
pub mod geometry;
pub mod intent;
pub mod layer;
pub mod stage;
pub mod store;

pub use editor::{
    download_name, EditMode, EditorAction, EditorPhase, EditorState, ImageState, OutputFormat,
    ResizeOptions,
};
pub use error::{CoreError, CoreResult};
pub use geometry::{BoundingBox, Dimension, PixelSize, Point, MIN_BOX_SIZE};
pub use intent::{ChatIntent, IntentRouter};
pub use layer::{Layer, LayerId, LayerPatch, SourceKey};
pub use stage::{Handle, StageConfig, StageInteraction};
pub use store::{LayerStore, StoreAction};

/// Core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
