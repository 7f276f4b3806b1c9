//! Layer records - one placed image on the composition stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{BoundingBox, PixelSize};

/// Where new layers land on the stage.
pub const DEFAULT_LAYER_OFFSET: (f32, f32) = (50.0, 50.0);

/// Unique identifier for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a new unique layer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to decoded pixel data held outside the layer.
///
/// A layer references its pixels, it does not own them. Whoever holds the
/// pixels must keep them alive while any layer carries the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey(Uuid);

impl SourceKey {
    /// Create a new unique source key.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "src:{}", self.0)
    }
}

/// A placed image on the composition stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique identifier, stable for the layer's lifetime.
    pub id: LayerId,
    /// Pixel data reference.
    pub source: SourceKey,
    /// Origin X in stage coordinates.
    pub x: f32,
    /// Origin Y in stage coordinates.
    pub y: f32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
    /// Horizontal scale applied to the intrinsic width.
    pub scale_x: f32,
    /// Vertical scale applied to the intrinsic height.
    pub scale_y: f32,
    /// Natural pixel size of the source at load time.
    intrinsic: PixelSize,
    /// Insertion order, also paint order.
    pub z_index: u64,
    /// Invisible layers are neither painted nor hit-tested.
    pub visible: bool,
    /// Display label.
    pub name: String,
}

impl Layer {
    /// Create a layer at the default offset with an identity transform.
    ///
    /// The z-index is assigned by the store on insertion.
    #[must_use]
    pub fn new(source: SourceKey, intrinsic: PixelSize, name: impl Into<String>) -> Self {
        Self {
            id: LayerId::new(),
            source,
            x: DEFAULT_LAYER_OFFSET.0,
            y: DEFAULT_LAYER_OFFSET.1,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            intrinsic,
            z_index: 0,
            visible: true,
            name: name.into(),
        }
    }

    /// Set the origin.
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Natural pixel size of the source at load time.
    #[must_use]
    pub fn intrinsic_size(&self) -> PixelSize {
        self.intrinsic
    }

    /// The transformed box this layer occupies on the stage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            x: self.x,
            y: self.y,
            width: self.intrinsic.width as f32 * self.scale_x,
            height: self.intrinsic.height as f32 * self.scale_y,
            rotation: self.rotation,
        }
    }

    /// Merge a patch into this layer. Identity and intrinsic size never change.
    pub fn apply(&mut self, patch: &LayerPatch) {
        if let Some(source) = patch.source {
            self.source = source;
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(scale_x) = patch.scale_x {
            self.scale_x = scale_x;
        }
        if let Some(scale_y) = patch.scale_y {
            self.scale_y = scale_y;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
    }
}

/// Partial layer attributes for [`crate::LayerStore::update_layer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPatch {
    /// Replacement pixel data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKey>,
    /// New origin X.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    /// New origin Y.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    /// New rotation in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    /// New horizontal scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f32>,
    /// New vertical scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f32>,
    /// New visibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// New display label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LayerPatch {
    /// Patch that only moves the origin.
    #[must_use]
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Patch that only swaps the pixel data.
    #[must_use]
    pub fn source(source: SourceKey) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Patch that only changes visibility.
    #[must_use]
    pub fn visibility(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }

    /// Patch committing a full transform at the end of a gesture.
    #[must_use]
    pub fn transform(x: f32, y: f32, rotation: f32, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            rotation: Some(rotation),
            scale_x: Some(scale_x),
            scale_y: Some(scale_y),
            ..Self::default()
        }
    }
}
