//! Transform geometry for layers and the single-image editor.
//!
//! Stage coordinates are `f32` with the y axis pointing down, so a positive
//! rotation turns a box clockwise on screen. Pixel dimensions are `u32`.

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Smallest width or height a resize gesture may produce, in stage units.
pub const MIN_BOX_SIZE: f32 = 5.0;

/// A point in stage coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X position (pixels from left).
    pub x: f32,
    /// Y position (pixels from top).
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Natural pixel dimensions of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Create a new pixel size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDimensions`] if either side is zero.
    pub fn aspect_ratio(self) -> CoreResult<f64> {
        if self.is_empty() {
            return Err(CoreError::InvalidDimensions {
                width: f64::from(self.width),
                height: f64::from(self.height),
            });
        }
        Ok(f64::from(self.width) / f64::from(self.height))
    }
}

impl std::fmt::Display for PixelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which side of a resize form the user edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// The width field.
    Width,
    /// The height field.
    Height,
}

/// Derive the other side of an aspect-locked resize.
///
/// The ratio always comes from `original`, never from the values currently
/// typed into the form, so repeated edits cannot drift.
///
/// # Errors
///
/// Returns [`CoreError::InvalidDimensions`] if `original` has a zero side.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn aspect_locked_size(original: PixelSize, edited: Dimension, value: u32) -> CoreResult<PixelSize> {
    let ratio = original.aspect_ratio()?;
    let size = match edited {
        Dimension::Width => PixelSize::new(value, (f64::from(value) / ratio).round() as u32),
        Dimension::Height => PixelSize::new((f64::from(value) * ratio).round() as u32, value),
    };
    Ok(size)
}

/// Rotate a vector clockwise by `degrees` (screen coordinates).
#[must_use]
pub fn rotate_vector(v: Point, degrees: f32) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Point::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// The on-stage box of a transformed layer.
///
/// `(x, y)` is the layer origin: its top-left corner before rotation. The box
/// rotates clockwise about that origin, which is how the stage places layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Origin X.
    pub x: f32,
    /// Origin Y.
    pub y: f32,
    /// Scaled width.
    pub width: f32,
    /// Scaled height.
    pub height: f32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
}

impl BoundingBox {
    /// Convert a stage point into this box's unrotated local frame.
    #[must_use]
    pub fn to_local(&self, p: Point) -> Point {
        rotate_vector(Point::new(p.x - self.x, p.y - self.y), -self.rotation)
    }

    /// Convert a local point back to stage coordinates.
    #[must_use]
    pub fn to_stage(&self, local: Point) -> Point {
        let r = rotate_vector(local, self.rotation);
        Point::new(self.x + r.x, self.y + r.y)
    }

    /// Whether a stage point falls inside the (rotated) box.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        let l = self.to_local(p);
        l.x >= 0.0 && l.x <= self.width && l.y >= 0.0 && l.y <= self.height
    }

    /// Centre of the box in stage coordinates.
    #[must_use]
    pub fn center(&self) -> Point {
        self.to_stage(Point::new(self.width / 2.0, self.height / 2.0))
    }

    /// The four corners in stage coordinates, clockwise from the origin.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            self.to_stage(Point::new(0.0, 0.0)),
            self.to_stage(Point::new(self.width, 0.0)),
            self.to_stage(Point::new(self.width, self.height)),
            self.to_stage(Point::new(0.0, self.height)),
        ]
    }

    /// Whether both sides reach `min`.
    #[must_use]
    pub fn meets_minimum(&self, min: f32) -> bool {
        self.width >= min && self.height >= min
    }
}

/// Accept `proposed` unless it falls below `min` on either side, in which
/// case `previous` is kept.
#[must_use]
pub fn constrain_box(previous: BoundingBox, proposed: BoundingBox, min: f32) -> BoundingBox {
    if proposed.meets_minimum(min) {
        proposed
    } else {
        tracing::debug!(
            "Rejected box {}x{} below minimum {min}",
            proposed.width,
            proposed.height
        );
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_aspect_lock_width_drives_height() {
        let size = aspect_locked_size(PixelSize::new(1200, 800), Dimension::Width, 600)
            .expect("valid ratio");
        assert_eq!(size, PixelSize::new(600, 400));
    }

    #[test]
    fn test_aspect_lock_height_drives_width() {
        let size = aspect_locked_size(PixelSize::new(1200, 800), Dimension::Height, 100)
            .expect("valid ratio");
        assert_eq!(size, PixelSize::new(150, 100));
    }

    #[test]
    fn test_aspect_lock_rounds() {
        // 1000 / (3 / 2) = 666.67
        let size = aspect_locked_size(PixelSize::new(300, 200), Dimension::Width, 1000)
            .expect("valid ratio");
        assert_eq!(size.height, 667);
    }

    #[test]
    fn test_aspect_lock_rejects_empty_original() {
        assert!(aspect_locked_size(PixelSize::new(0, 10), Dimension::Width, 5).is_err());
    }

    #[test]
    fn test_rotated_box_contains() {
        let bbox = BoundingBox {
            x: 100.0,
            y: 100.0,
            width: 100.0,
            height: 20.0,
            rotation: 90.0,
        };
        // Rotated clockwise by 90 degrees the box hangs below its origin, to the left.
        assert!(bbox.contains(Point::new(90.0, 150.0)));
        assert!(!bbox.contains(Point::new(150.0, 110.0)));
    }

    #[test]
    fn test_local_round_trip() {
        let bbox = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 50.0,
            height: 30.0,
            rotation: 37.0,
        };
        let p = Point::new(42.0, 17.0);
        let back = bbox.to_stage(bbox.to_local(p));
        assert!(approx(back.x, p.x));
        assert!(approx(back.y, p.y));
    }

    #[test]
    fn test_constrain_box_rejects_small() {
        let old = BoundingBox {
            width: 100.0,
            height: 100.0,
            ..Default::default()
        };
        let tiny = BoundingBox {
            width: 3.0,
            height: 3.0,
            ..Default::default()
        };
        assert_eq!(constrain_box(old, tiny, MIN_BOX_SIZE), old);

        let ok = BoundingBox {
            width: 5.0,
            height: 40.0,
            ..Default::default()
        };
        assert_eq!(constrain_box(old, ok, MIN_BOX_SIZE), ok);
    }
}
