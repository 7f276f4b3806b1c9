//! Stage configuration and pointer-driven direct manipulation.
//!
//! A gesture runs from pointer-down to pointer-up. While it runs only a
//! preview box changes; the store sees a single patch when the pointer is
//! released.
//!
//! ```text
//!   down on handle ──► Transform ──up──► commit x, y, rotation, scale
//!   down on layer  ──► Drag      ──up──► commit x, y
//!   down on empty  ──► clear selection
//! ```

use serde::{Deserialize, Serialize};

use crate::geometry::{constrain_box, rotate_vector, BoundingBox, Point, MIN_BOX_SIZE};
use crate::layer::{LayerId, LayerPatch};
use crate::store::LayerStore;

/// Pointer distance within which a handle is grabbed.
pub const HANDLE_RADIUS: f32 = 6.0;

/// Distance of the rotate handle above the top edge.
pub const ROTATE_HANDLE_OFFSET: f32 = 50.0;

/// Size and backdrop of the composition stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage width in stage units.
    pub width: f32,
    /// Stage height in stage units.
    pub height: f32,
    /// Background colour as RGBA bytes.
    pub background: [u8; 4],
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            background: [255, 255, 255, 255],
        }
    }
}

/// Transform handles drawn around the selected layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handle {
    /// Top-left corner.
    TopLeft,
    /// Middle of the top edge.
    TopCenter,
    /// Top-right corner.
    TopRight,
    /// Middle of the right edge.
    MiddleRight,
    /// Bottom-right corner.
    BottomRight,
    /// Middle of the bottom edge.
    BottomCenter,
    /// Bottom-left corner.
    BottomLeft,
    /// Middle of the left edge.
    MiddleLeft,
    /// Rotation knob above the top edge.
    Rotate,
}

impl Handle {
    /// Every handle, in hit-test priority order.
    pub const ALL: [Self; 9] = [
        Self::Rotate,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
        Self::TopCenter,
        Self::MiddleRight,
        Self::BottomCenter,
        Self::MiddleLeft,
    ];

    /// Position in the box's local frame.
    #[must_use]
    pub fn local_position(self, width: f32, height: f32) -> Point {
        let (hx, hy) = (width / 2.0, height / 2.0);
        match self {
            Self::TopLeft => Point::new(0.0, 0.0),
            Self::TopCenter => Point::new(hx, 0.0),
            Self::TopRight => Point::new(width, 0.0),
            Self::MiddleRight => Point::new(width, hy),
            Self::BottomRight => Point::new(width, height),
            Self::BottomCenter => Point::new(hx, height),
            Self::BottomLeft => Point::new(0.0, height),
            Self::MiddleLeft => Point::new(0.0, hy),
            Self::Rotate => Point::new(hx, -ROTATE_HANDLE_OFFSET),
        }
    }

    /// Position on the stage for a given box.
    #[must_use]
    pub fn stage_position(self, bbox: &BoundingBox) -> Point {
        bbox.to_stage(self.local_position(bbox.width, bbox.height))
    }

    fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::MiddleLeft | Self::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::MiddleRight | Self::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopCenter | Self::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomCenter | Self::BottomRight)
    }
}

/// Find the handle of `bbox` under a stage point.
#[must_use]
pub fn handle_at(bbox: &BoundingBox, p: Point) -> Option<Handle> {
    Handle::ALL
        .into_iter()
        .find(|h| h.stage_position(bbox).distance(p) <= HANDLE_RADIUS)
}

/// Box produced by dragging `handle` of `start` to pointer `p`.
///
/// Edge handles move one side, corner handles two; the opposite sides stay
/// fixed in the box's own (rotated) frame. The rotate handle turns the box
/// about its centre.
#[must_use]
pub fn drag_handle(start: &BoundingBox, handle: Handle, p: Point) -> BoundingBox {
    if handle == Handle::Rotate {
        let c = start.center();
        let mut rotation = (p.y - c.y).atan2(p.x - c.x).to_degrees() + 90.0;
        if rotation > 180.0 {
            rotation -= 360.0;
        }
        let half = rotate_vector(Point::new(start.width / 2.0, start.height / 2.0), rotation);
        return BoundingBox {
            x: c.x - half.x,
            y: c.y - half.y,
            rotation,
            ..*start
        };
    }

    let local = start.to_local(p);
    let (mut left, mut top, mut right, mut bottom) = (0.0, 0.0, start.width, start.height);
    if handle.moves_left() {
        left = local.x;
    }
    if handle.moves_right() {
        right = local.x;
    }
    if handle.moves_top() {
        top = local.y;
    }
    if handle.moves_bottom() {
        bottom = local.y;
    }
    let origin = start.to_stage(Point::new(left, top));
    BoundingBox {
        x: origin.x,
        y: origin.y,
        width: right - left,
        height: bottom - top,
        rotation: start.rotation,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    Drag {
        id: LayerId,
        grab: Point,
        start: BoundingBox,
        current: BoundingBox,
    },
    Transform {
        id: LayerId,
        handle: Handle,
        start: BoundingBox,
        current: BoundingBox,
    },
}

/// Pointer interaction state for the stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInteraction {
    config: StageConfig,
    gesture: Gesture,
    min_box: f32,
}

impl Default for StageInteraction {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}

impl StageInteraction {
    /// Create an idle interaction for a stage.
    #[must_use]
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            gesture: Gesture::Idle,
            min_box: MIN_BOX_SIZE,
        }
    }

    /// Stage configuration.
    #[must_use]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// The live box of the layer being manipulated, for interactive drawing.
    #[must_use]
    pub fn preview(&self) -> Option<(LayerId, BoundingBox)> {
        match &self.gesture {
            Gesture::Idle => None,
            Gesture::Drag { id, current, .. } | Gesture::Transform { id, current, .. } => {
                Some((*id, *current))
            }
        }
    }

    /// Pointer pressed. Grabs a handle of the selected layer, else selects
    /// and starts dragging the top-most layer under the pointer, else clears
    /// the selection.
    pub fn pointer_down(&mut self, store: &mut LayerStore, p: Point) {
        if let Some(layer) = store.selected_layer() {
            let bbox = layer.bounding_box();
            if let Some(handle) = handle_at(&bbox, p) {
                tracing::debug!("Grabbed {handle:?} of layer {}", layer.id);
                self.gesture = Gesture::Transform {
                    id: layer.id,
                    handle,
                    start: bbox,
                    current: bbox,
                };
                return;
            }
        }

        match store.layer_at(p) {
            Some(id) => {
                store.select(Some(id));
                let bbox = store
                    .get(id)
                    .map(crate::layer::Layer::bounding_box)
                    .unwrap_or_default();
                self.gesture = Gesture::Drag {
                    id,
                    grab: p,
                    start: bbox,
                    current: bbox,
                };
            }
            None => {
                store.select(None);
                self.gesture = Gesture::Idle;
            }
        }
    }

    /// Pointer moved. Only the preview changes.
    pub fn pointer_move(&mut self, p: Point) {
        let min_box = self.min_box;
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Drag {
                grab,
                start,
                current,
                ..
            } => {
                current.x = start.x + (p.x - grab.x);
                current.y = start.y + (p.y - grab.y);
            }
            Gesture::Transform {
                handle,
                start,
                current,
                ..
            } => {
                let proposed = drag_handle(start, *handle, p);
                *current = constrain_box(*current, proposed, min_box);
            }
        }
    }

    /// Pointer released. Commits the gesture to the store and returns the
    /// patch that was applied, if any.
    pub fn pointer_up(&mut self, store: &mut LayerStore) -> Option<(LayerId, LayerPatch)> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let (id, patch) = match gesture {
            Gesture::Idle => return None,
            Gesture::Drag { id, start, current, .. } => {
                if (current.x, current.y) == (start.x, start.y) {
                    return None;
                }
                (id, LayerPatch::position(current.x, current.y))
            }
            Gesture::Transform { id, start, current, .. } => {
                let layer = store.get(id)?;
                // Scale accumulates: the box ratio multiplies the current scale.
                let fx = if start.width > 0.0 { current.width / start.width } else { 1.0 };
                let fy = if start.height > 0.0 { current.height / start.height } else { 1.0 };
                (
                    id,
                    LayerPatch::transform(
                        current.x,
                        current.y,
                        current.rotation,
                        layer.scale_x * fx,
                        layer.scale_y * fy,
                    ),
                )
            }
        };
        tracing::debug!("Committing gesture on layer {id}: {patch:?}");
        store.update_layer(id, patch.clone());
        Some((id, patch))
    }

    /// Abandon the current gesture without touching the store.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }
}
