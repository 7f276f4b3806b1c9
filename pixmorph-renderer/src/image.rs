//! Image decoding and data URI utilities.
//!
//! Supports raw bytes (PNG, JPEG, WebP, GIF and our own SVG envelope) and
//! base64 or percent-encoded data URIs.

use base64::Engine;
use pixmorph_core::{OutputFormat, PixelSize};

use crate::error::{RenderError, RenderResult};

/// Decoded RGBA pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Straight (non-premultiplied) RGBA, 4 bytes per pixel.
    pub data: Vec<u8>,
    /// Format the pixels were decoded from.
    pub format: ImageFormat,
}

impl TextureData {
    /// Natural size.
    #[must_use]
    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    /// Borrow as an `image` buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match the dimensions.
    pub fn to_rgba_image(&self) -> RenderResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| RenderError::Decode("texture length does not match dimensions".into()))
    }

    /// Wrap an `image` buffer.
    #[must_use]
    pub fn from_rgba_image(img: image::RgbaImage, format: ImageFormat) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
            format,
        }
    }

    /// RGBA of the pixel at `(x, y)`, if in bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Formats recognised on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF.
    Gif,
    /// SVG envelope around an embedded raster.
    Svg,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "webp" => Self::WebP,
            "gif" => Self::Gif,
            "svg" => Self::Svg,
            _ => Self::Unknown,
        }
    }

    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/gif" => Self::Gif,
            "image/svg+xml" => Self::Svg,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // GIF: GIF87a / GIF89a
        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        let head = String::from_utf8_lossy(&data[..data.len().min(256)]);
        let head = head.trim_start();
        if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
            return Self::Svg;
        }

        Self::Unknown
    }

    /// The matching output format, if we can write it.
    #[must_use]
    pub fn as_output(self) -> Option<OutputFormat> {
        match self {
            Self::Png => Some(OutputFormat::Png),
            Self::Jpeg => Some(OutputFormat::Jpeg),
            Self::WebP => Some(OutputFormat::WebP),
            Self::Gif => Some(OutputFormat::Gif),
            Self::Svg => Some(OutputFormat::Svg),
            Self::Unknown => None,
        }
    }
}

/// Encoded image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime: String,
}

impl EncodedImage {
    /// Wrap bytes with a MIME type.
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Wrap bytes, sniffing the MIME type from magic bytes.
    #[must_use]
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        let mime = ImageFormat::from_magic_bytes(&bytes)
            .as_output()
            .map_or("application/octet-stream", OutputFormat::mime);
        Self::new(bytes, mime)
    }

    /// Parse a `data:` URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is malformed.
    pub fn from_data_uri(uri: &str) -> RenderResult<Self> {
        let (mime, bytes) = parse_data_uri(uri)?;
        Ok(Self::new(bytes, mime))
    }

    /// Render as a base64 `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        to_data_uri(&self.mime, &self.bytes)
    }

    /// Output format named by the MIME type.
    #[must_use]
    pub fn format(&self) -> Option<OutputFormat> {
        OutputFormat::from_mime(&self.mime)
    }

    /// Decode to pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a supported image.
    pub fn decode(&self) -> RenderResult<TextureData> {
        load_image_from_bytes(&self.bytes)
    }
}

/// Load an image from raw bytes.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn load_image_from_bytes(data: &[u8]) -> RenderResult<TextureData> {
    let format = ImageFormat::from_magic_bytes(data);

    if format == ImageFormat::Svg {
        return load_svg_envelope(data);
    }

    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Decode(format!("{e}")))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    tracing::trace!("Decoded {format:?} image {width}x{height}");

    Ok(TextureData {
        width,
        height,
        data: rgba.into_raw(),
        format,
    })
}

/// Pull the embedded raster out of an SVG envelope.
fn load_svg_envelope(data: &[u8]) -> RenderResult<TextureData> {
    let text = std::str::from_utf8(data)
        .map_err(|e| RenderError::Decode(format!("SVG is not UTF-8: {e}")))?;
    let start = text
        .find("href=\"data:")
        .map(|i| i + "href=\"".len())
        .ok_or_else(|| RenderError::Decode("SVG carries no embedded raster".into()))?;
    let end = text[start..]
        .find('"')
        .map(|i| start + i)
        .ok_or_else(|| RenderError::Decode("unterminated href in SVG".into()))?;

    let (_, bytes) = parse_data_uri(&text[start..end])?;
    let mut texture = load_image_from_bytes(&bytes)?;
    texture.format = ImageFormat::Svg;
    Ok(texture)
}

/// Split a data URI into its MIME type and decoded payload.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns an error if the data URI is malformed.
pub fn parse_data_uri(uri: &str) -> RenderResult<(String, Vec<u8>)> {
    let uri_data = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::DataUri("missing data: prefix".to_string()))?;

    let comma_pos = uri_data
        .find(',')
        .ok_or_else(|| RenderError::DataUri("missing comma".to_string()))?;

    let metadata = &uri_data[..comma_pos];
    let encoded_data = &uri_data[comma_pos + 1..];
    let mime = metadata
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_string();

    let bytes = if metadata.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(encoded_data.trim())
            .map_err(|e| RenderError::DataUri(format!("bad base64: {e}")))?
    } else {
        percent_decode(encoded_data)?
    };

    Ok((mime, bytes))
}

/// Load an image from a data URI (base64 encoded).
///
/// # Errors
///
/// Returns an error if the data URI is malformed or the image cannot be decoded.
pub fn load_image_from_data_uri(uri: &str) -> RenderResult<TextureData> {
    let (_, bytes) = parse_data_uri(uri)?;
    load_image_from_bytes(&bytes)
}

/// Encode bytes as a base64 data URI.
#[must_use]
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{payload}")
}

/// Approximate decoded size of a base64 data URI in bytes.
#[must_use]
pub fn data_uri_size(uri: &str) -> usize {
    let payload = uri.split_once(',').map_or(uri, |(_, p)| p);
    let padding = payload.bytes().filter(|&b| b == b'=').count();
    (payload.len() * 3 / 4).saturating_sub(padding)
}

/// Human readable byte count (`0 B`, `1.5 KB`, `2 MB`).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exp = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exp as i32);
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exp])
}

/// Percent decoding for non-base64 data URI payloads.
fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::DataUri("invalid percent encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}

/// Create a solid color texture.
#[must_use]
pub fn create_solid_color(width: u32, height: u32, rgba: [u8; 4]) -> TextureData {
    let pixel_count = (width as usize) * (height as usize);
    TextureData {
        width,
        height,
        data: rgba.repeat(pixel_count),
        format: ImageFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x1 red PNG.
    const RED_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    #[test]
    fn test_format_detection_from_extension() {
        assert_eq!(ImageFormat::from_extension("png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("PNG"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("gif"), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_extension("bmp"), ImageFormat::Unknown);
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a.."), ImageFormat::Gif);
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"  <svg xmlns=\"x\"></svg>"),
            ImageFormat::Svg
        );
    }

    #[test]
    fn test_data_uri_parsing() {
        let data_uri = format!("data:image/png;base64,{RED_PNG_BASE64}");

        let texture = load_image_from_data_uri(&data_uri).expect("valid data URI");
        assert_eq!(texture.size(), PixelSize::new(1, 1));
        assert_eq!(texture.format, ImageFormat::Png);

        let encoded = EncodedImage::from_data_uri(&data_uri).expect("parse");
        assert_eq!(encoded.mime, "image/png");
        assert_eq!(encoded.format(), Some(OutputFormat::Png));
        assert_eq!(encoded.to_data_uri(), data_uri);
    }

    #[test]
    fn test_percent_encoded_payload() {
        let (mime, bytes) = parse_data_uri("data:text/plain,a%20b").expect("parse");
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"a b");
        assert!(parse_data_uri("data:text/plain,%zz").is_err());
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(load_image_from_data_uri("not a data uri").is_err());
        assert!(load_image_from_data_uri("data:image/png").is_err());
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = load_image_from_bytes(b"definitely not an image").expect_err("garbage");
        assert!(matches!(err, RenderError::Decode(_)));
    }

    #[test]
    fn test_svg_envelope_round_trip() {
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"1\" height=\"1\"><image href=\"data:image/png;base64,{RED_PNG_BASE64}\" width=\"1\" height=\"1\"/></svg>"
        );
        let texture = load_image_from_bytes(svg.as_bytes()).expect("envelope");
        assert_eq!(texture.format, ImageFormat::Svg);
        assert_eq!(texture.pixel(0, 0).map(|p| p[0]), Some(255));
    }

    #[test]
    fn test_data_uri_size() {
        // "hello" -> aGVsbG8= (8 chars, 1 pad) -> 5 bytes
        assert_eq!(data_uri_size("data:text/plain;base64,aGVsbG8="), 5);
        assert_eq!(data_uri_size(&to_data_uri("image/png", &[0u8; 300])), 300);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn test_create_solid_color() {
        let texture = create_solid_color(2, 2, [255, 0, 0, 255]);
        assert_eq!(texture.data.len(), 16);
        assert_eq!(texture.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(texture.pixel(2, 0), None);
    }
}
