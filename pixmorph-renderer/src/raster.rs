//! Stage flattening with tiny-skia.
//!
//! Paints the stage background, then every visible layer in paint order with
//! its translate/rotate/scale transform, and optionally the selection frame.

use pixmorph_core::{BoundingBox, Handle, Layer, LayerId, LayerStore, PixelSize, StageConfig};
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint,
    Rect, Stroke, Transform,
};

use crate::error::{RenderError, RenderResult};
use crate::image::{ImageFormat, TextureData};
use crate::source_cache::SourceCache;

/// Selection frame colour.
const SELECTION_RGBA: [u8; 4] = [0, 161, 255, 255];
/// Side of a square handle in stage units.
const HANDLE_SIZE: f32 = 10.0;

/// Per-call rasterization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Output pixels per stage unit.
    pub pixel_ratio: f32,
    /// Draw the selection frame and handles for this layer.
    pub selection: Option<LayerId>,
    /// Draw this layer at an in-flight gesture box instead of its committed one.
    pub preview: Option<(LayerId, BoundingBox)>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            pixel_ratio: 1.0,
            selection: None,
            preview: None,
        }
    }
}

impl RasterOptions {
    /// Plain capture at a pixel ratio, without overlays.
    #[must_use]
    pub fn at_ratio(pixel_ratio: f32) -> Self {
        Self {
            pixel_ratio,
            ..Self::default()
        }
    }
}

/// Flattens a [`LayerStore`] into pixels.
#[derive(Debug, Clone, Default)]
pub struct StageRasterizer {
    config: StageConfig,
}

impl StageRasterizer {
    /// Create a rasterizer for a stage.
    #[must_use]
    pub fn new(config: StageConfig) -> Self {
        Self { config }
    }

    /// The stage being rasterized.
    #[must_use]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Pixel size of a capture at `pixel_ratio`. Never below 1x1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn output_size(&self, pixel_ratio: f32) -> PixelSize {
        let w = (self.config.width * pixel_ratio).round().max(1.0) as u32;
        let h = (self.config.height * pixel_ratio).round().max(1.0) as u32;
        PixelSize::new(w, h)
    }

    /// Render the stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface cannot be allocated or a visible layer
    /// references a source missing from `cache`.
    pub fn rasterize(
        &self,
        store: &LayerStore,
        cache: &SourceCache,
        options: &RasterOptions,
    ) -> RenderResult<TextureData> {
        if !(options.pixel_ratio.is_finite() && options.pixel_ratio > 0.0) {
            return Err(RenderError::Surface(format!(
                "pixel ratio {} is not positive",
                options.pixel_ratio
            )));
        }

        let size = self.output_size(options.pixel_ratio);
        let mut pixmap = Pixmap::new(size.width, size.height)
            .ok_or_else(|| RenderError::Surface(format!("{size} is not a valid surface")))?;

        let [r, g, b, a] = self.config.background;
        pixmap.fill(Color::from_rgba8(r, g, b, a));

        let base = Transform::from_scale(options.pixel_ratio, options.pixel_ratio);
        let mut frame = None;

        for layer in store.visible_layers() {
            let bbox = match options.preview {
                Some((id, preview)) if id == layer.id => preview,
                _ => layer.bounding_box(),
            };
            draw_layer(&mut pixmap, layer, &bbox, cache, base)?;
            if options.selection == Some(layer.id) {
                frame = Some(bbox);
            }
        }

        if let Some(bbox) = frame {
            draw_selection(&mut pixmap, &bbox, base);
        }

        tracing::debug!(
            "Rasterized {} layer(s) to {size} at ratio {}",
            store.visible_layers().count(),
            options.pixel_ratio
        );

        Ok(pixmap_to_texture(&pixmap))
    }
}

/// Convert straight RGBA into a premultiplied pixmap.
///
/// # Errors
///
/// Returns an error if the texture is empty or its buffer is the wrong length.
pub fn texture_to_pixmap(texture: &TextureData) -> RenderResult<Pixmap> {
    let size = IntSize::from_wh(texture.width, texture.height)
        .ok_or_else(|| RenderError::Surface(format!("{}x{}", texture.width, texture.height)))?;

    let mut data = Vec::with_capacity(texture.data.len());
    for px in texture.data.chunks_exact(4) {
        let p = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
        data.extend_from_slice(&[p.red(), p.green(), p.blue(), p.alpha()]);
    }

    Pixmap::from_vec(data, size)
        .ok_or_else(|| RenderError::Surface("texture buffer does not match its size".into()))
}

/// Convert a premultiplied pixmap back into straight RGBA.
#[must_use]
pub fn pixmap_to_texture(pixmap: &Pixmap) -> TextureData {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    TextureData {
        width: pixmap.width(),
        height: pixmap.height(),
        data,
        format: ImageFormat::Png,
    }
}

#[allow(clippy::cast_precision_loss)]
fn draw_layer(
    target: &mut Pixmap,
    layer: &Layer,
    bbox: &BoundingBox,
    cache: &SourceCache,
    base: Transform,
) -> RenderResult<()> {
    let texture = cache
        .peek(layer.source)
        .ok_or_else(|| RenderError::MissingSource(layer.source.to_string()))?;
    if texture.width == 0 || texture.height == 0 {
        tracing::warn!("Skipping empty source for layer {}", layer.id);
        return Ok(());
    }
    let source = texture_to_pixmap(texture)?;

    let sx = bbox.width / texture.width as f32;
    let sy = bbox.height / texture.height as f32;
    let transform = base
        .pre_translate(bbox.x, bbox.y)
        .pre_concat(Transform::from_rotate(bbox.rotation))
        .pre_scale(sx, sy);

    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    target.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    Ok(())
}

fn draw_selection(target: &mut Pixmap, bbox: &BoundingBox, base: Transform) {
    let [r, g, b, a] = SELECTION_RGBA;
    let mut stroke_paint = Paint::default();
    stroke_paint.set_color_rgba8(r, g, b, a);
    stroke_paint.anti_alias = true;
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };

    let corners = bbox.corners();
    let mut pb = PathBuilder::new();
    pb.move_to(corners[0].x, corners[0].y);
    for c in &corners[1..] {
        pb.line_to(c.x, c.y);
    }
    pb.close();
    let top = Handle::TopCenter.stage_position(bbox);
    let knob = Handle::Rotate.stage_position(bbox);
    pb.move_to(top.x, top.y);
    pb.line_to(knob.x, knob.y);
    if let Some(path) = pb.finish() {
        target.stroke_path(&path, &stroke_paint, &stroke, base, None);
    }

    let mut fill_paint = Paint::default();
    fill_paint.set_color_rgba8(255, 255, 255, 255);
    fill_paint.anti_alias = true;

    for handle in Handle::ALL {
        let p = handle.stage_position(bbox);
        let half = HANDLE_SIZE / 2.0;
        let path = if handle == Handle::Rotate {
            PathBuilder::from_circle(p.x, p.y, half)
        } else {
            Rect::from_xywh(-half, -half, HANDLE_SIZE, HANDLE_SIZE).map(PathBuilder::from_rect)
        };
        let Some(path) = path else { continue };
        let transform = if handle == Handle::Rotate {
            base
        } else {
            base.pre_translate(p.x, p.y)
                .pre_concat(Transform::from_rotate(bbox.rotation))
        };
        target.fill_path(&path, &fill_paint, FillRule::Winding, transform, None);
        target.stroke_path(&path, &stroke_paint, &stroke, transform, None);
    }
}
