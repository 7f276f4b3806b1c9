//! Output encoding and local resize.
//!
//! Encodes decoded pixels to PNG, JPEG, WebP, GIF or an SVG envelope, and
//! resizes an image to a target size before encoding it.

use std::io::Cursor;

use base64::Engine;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder};
use pixmorph_core::{OutputFormat, ResizeOptions};

use crate::error::{RenderError, RenderResult};
use crate::image::{EncodedImage, ImageFormat, TextureData};

/// Backdrop for formats without alpha.
const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Encode pixels to `format`.
///
/// `quality` is a percentage in `1..=100` and only affects JPEG. WebP is
/// written lossless.
///
/// # Errors
///
/// Returns an error if the texture is empty or the encoder fails.
pub fn encode(texture: &TextureData, format: OutputFormat, quality: u8) -> RenderResult<EncodedImage> {
    if texture.width == 0 || texture.height == 0 {
        return Err(encode_error(format, "image has no pixels"));
    }

    let bytes = match format {
        OutputFormat::Png => encode_png(texture)?,
        OutputFormat::Jpeg => encode_jpeg(texture, quality)?,
        OutputFormat::WebP => encode_webp(texture)?,
        OutputFormat::Gif => encode_gif(texture)?,
        OutputFormat::Svg => encode_svg(texture)?.into_bytes(),
    };

    tracing::debug!(
        "Encoded {}x{} as {format} ({} bytes)",
        texture.width,
        texture.height,
        bytes.len()
    );
    Ok(EncodedImage::new(bytes, format.mime()))
}

/// Resize `texture` to the option's size and encode it with its format and
/// quality.
///
/// # Errors
///
/// Returns [`RenderError::Surface`] for a zero target size, or an encode error.
pub fn process_image_locally(texture: &TextureData, options: &ResizeOptions) -> RenderResult<EncodedImage> {
    let target = options.size();
    if target.is_empty() {
        return Err(RenderError::Surface(format!("target size {target} is empty")));
    }

    let source = texture.to_rgba_image()?;
    let resized = if source.dimensions() == (target.width, target.height) {
        source
    } else {
        image::imageops::resize(&source, target.width, target.height, FilterType::Lanczos3)
    };
    let mut out = TextureData::from_rgba_image(resized, texture.format);

    if !options.format.supports_alpha() {
        flatten_onto_background(&mut out);
    }

    tracing::info!(
        "Processed image {}x{} -> {target} as {}",
        texture.width,
        texture.height,
        options.format
    );
    encode(&out, options.format, options.quality_percent())
}

/// Re-encode already encoded bytes into `format`.
///
/// Bytes already in the requested format are returned as they are.
///
/// # Errors
///
/// Returns an error if decoding or encoding fails.
pub fn transcode(image: &EncodedImage, format: OutputFormat, quality: u8) -> RenderResult<EncodedImage> {
    if ImageFormat::from_magic_bytes(&image.bytes).as_output() == Some(format) {
        return Ok(EncodedImage::new(image.bytes.clone(), format.mime()));
    }
    let texture = image.decode()?;
    encode(&texture, format, quality)
}

fn encode_png(texture: &TextureData) -> RenderResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(&texture.data, texture.width, texture.height, ExtendedColorType::Rgba8)
        .map_err(|e| encode_error(OutputFormat::Png, e))?;
    Ok(buf.into_inner())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_jpeg(texture: &TextureData, quality: u8) -> RenderResult<Vec<u8>> {
    let bg = FLATTEN_BACKGROUND;
    let mut rgb_data = Vec::with_capacity(texture.data.len() / 4 * 3);
    for pixel in texture.data.chunks_exact(4) {
        let alpha = f32::from(pixel[3]) / 255.0;
        let inv = 1.0 - alpha;
        for (&c, &b) in pixel[..3].iter().zip(&bg) {
            rgb_data.push(f32::from(c).mul_add(alpha, f32::from(b) * inv).round() as u8);
        }
    }

    let mut buf = Cursor::new(Vec::new());
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .write_image(&rgb_data, texture.width, texture.height, ExtendedColorType::Rgb8)
        .map_err(|e| encode_error(OutputFormat::Jpeg, e))?;
    Ok(buf.into_inner())
}

fn encode_webp(texture: &TextureData) -> RenderResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image::codecs::webp::WebPEncoder::new_lossless(&mut buf)
        .write_image(&texture.data, texture.width, texture.height, ExtendedColorType::Rgba8)
        .map_err(|e| encode_error(OutputFormat::WebP, e))?;
    Ok(buf.into_inner())
}

fn encode_gif(texture: &TextureData) -> RenderResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut encoder = image::codecs::gif::GifEncoder::new(&mut buf);
        encoder
            .encode(&texture.data, texture.width, texture.height, ExtendedColorType::Rgba8)
            .map_err(|e| encode_error(OutputFormat::Gif, e))?;
    }
    Ok(buf)
}

/// Wrap a PNG rendition of the pixels in an SVG document.
fn encode_svg(texture: &TextureData) -> RenderResult<String> {
    let png = encode_png(texture)?;
    let payload = base64::engine::general_purpose::STANDARD.encode(png);
    let (w, h) = (texture.width, texture.height);

    Ok(format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\"><image href=\"data:image/png;base64,{payload}\" width=\"{w}\" height=\"{h}\"/></svg>",
    ))
}

/// Composite every pixel over the flatten backdrop, leaving it opaque.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn flatten_onto_background(texture: &mut TextureData) {
    for pixel in texture.data.chunks_exact_mut(4) {
        let alpha = f32::from(pixel[3]) / 255.0;
        let inv = 1.0 - alpha;
        for (c, &b) in pixel[..3].iter_mut().zip(&FLATTEN_BACKGROUND) {
            *c = f32::from(*c).mul_add(alpha, f32::from(b) * inv).round() as u8;
        }
        pixel[3] = 255;
    }
}

fn encode_error(format: OutputFormat, reason: impl std::fmt::Display) -> RenderError {
    RenderError::Encode {
        format: format.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{create_solid_color, load_image_from_bytes};
    use pixmorph_core::PixelSize;

    fn options(width: u32, height: u32, format: OutputFormat) -> ResizeOptions {
        ResizeOptions {
            width,
            height,
            format,
            ..ResizeOptions::default()
        }
    }

    #[test]
    fn test_png_export() {
        let out = encode(&create_solid_color(4, 4, [1, 2, 3, 255]), OutputFormat::Png, 90)
            .expect("png");
        assert_eq!(&out.bytes[0..4], &[137, 80, 78, 71]);
        assert_eq!(out.mime, "image/png");
    }

    #[test]
    fn test_jpeg_export() {
        let out = encode(&create_solid_color(8, 8, [200, 10, 10, 255]), OutputFormat::Jpeg, 90)
            .expect("jpeg");
        // JPEG SOI marker: FF D8
        assert_eq!(&out.bytes[0..2], &[0xFF, 0xD8]);
        assert_eq!(out.mime, "image/jpeg");
    }

    #[test]
    fn test_jpeg_flattens_transparent_pixels() {
        let out = encode(&create_solid_color(7, 3, [0, 0, 0, 0]), OutputFormat::Jpeg, 100)
            .expect("jpeg");
        let decoded = load_image_from_bytes(&out.bytes).expect("decode");
        assert_eq!(decoded.size(), PixelSize::new(7, 3));
        let px = decoded.pixel(3, 1).expect("pixel");
        assert!(px[..3].iter().all(|&c| c > 245), "{px:?}");
    }

    #[test]
    fn test_jpeg_quality_changes_size() {
        let mut texture = create_solid_color(64, 64, [0, 0, 0, 255]);
        for (i, b) in texture.data.iter_mut().enumerate() {
            if i % 4 != 3 {
                *b = u8::try_from((i * 37) % 251).unwrap_or(0);
            }
        }
        let low = encode(&texture, OutputFormat::Jpeg, 10).expect("low");
        let high = encode(&texture, OutputFormat::Jpeg, 100).expect("high");
        assert!(low.bytes.len() < high.bytes.len());
    }

    #[test]
    fn test_webp_and_gif_signatures() {
        let texture = create_solid_color(4, 4, [0, 128, 0, 255]);
        let webp = encode(&texture, OutputFormat::WebP, 90).expect("webp");
        assert_eq!(&webp.bytes[0..4], b"RIFF");
        assert_eq!(&webp.bytes[8..12], b"WEBP");

        let gif = encode(&texture, OutputFormat::Gif, 90).expect("gif");
        assert_eq!(&gif.bytes[0..4], b"GIF8");
    }

    #[test]
    fn test_svg_envelope() {
        let out = encode(&create_solid_color(3, 2, [9, 9, 9, 255]), OutputFormat::Svg, 90)
            .expect("svg");
        let svg = String::from_utf8(out.bytes.clone()).expect("utf8");
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"3\" height=\"2\">"));
        assert!(svg.contains("<image href=\"data:image/png;base64,"));
        assert!(svg.ends_with("width=\"3\" height=\"2\"/></svg>"));
        assert_eq!(out.mime, "image/svg+xml");

        let decoded = load_image_from_bytes(&out.bytes).expect("decode envelope");
        assert_eq!(decoded.size(), PixelSize::new(3, 2));
    }

    #[test]
    fn test_empty_texture_rejected() {
        let err = encode(&create_solid_color(0, 0, [0; 4]), OutputFormat::Png, 90).expect_err("empty");
        assert!(matches!(err, RenderError::Encode { .. }));
    }

    #[test]
    fn test_local_resize_hits_target_size() {
        let texture = create_solid_color(40, 20, [255, 0, 0, 255]);
        let out = process_image_locally(&texture, &options(10, 5, OutputFormat::Png)).expect("resize");
        let decoded = load_image_from_bytes(&out.bytes).expect("decode");
        assert_eq!(decoded.size(), PixelSize::new(10, 5));
    }

    #[test]
    fn test_local_resize_flattens_alpha_for_jpeg() {
        let texture = create_solid_color(4, 4, [0, 0, 0, 0]);
        let out = process_image_locally(&texture, &options(4, 4, OutputFormat::Jpeg)).expect("jpeg");
        let decoded = load_image_from_bytes(&out.bytes).expect("decode");
        let px = decoded.pixel(1, 1).expect("pixel");
        assert!(px[0] > 245 && px[1] > 245 && px[2] > 245);
    }

    #[test]
    fn test_local_resize_zero_target() {
        let texture = create_solid_color(4, 4, [0, 0, 0, 255]);
        let err = process_image_locally(&texture, &options(0, 4, OutputFormat::Png)).expect_err("zero");
        assert!(matches!(err, RenderError::Surface(_)));
    }

    #[test]
    fn test_transcode_passthrough_and_convert() {
        let png = encode(&create_solid_color(2, 2, [5, 5, 5, 255]), OutputFormat::Png, 90).expect("png");
        let same = transcode(&png, OutputFormat::Png, 90).expect("same");
        assert_eq!(same.bytes, png.bytes);

        let jpeg = transcode(&png, OutputFormat::Jpeg, 90).expect("jpeg");
        assert_eq!(&jpeg.bytes[0..2], &[0xFF, 0xD8]);
    }
}
