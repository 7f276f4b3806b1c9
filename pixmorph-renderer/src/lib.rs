//! # PixMorph Renderer
//!
//! Everything that touches pixels: decoding uploads and data URIs, holding
//! decoded sources, flattening the stage and encoding results.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ bytes / URI  │──▶│ SourceCache  │──▶│ StageRasterizer  │──▶│ encode()     │
//! │ (decode)     │   │ (by key)     │   │ (tiny-skia)      │   │ png/jpg/...  │
//! └──────────────┘   └──────────────┘   └──────────────────┘   └──────────────┘
//!                           │                                          ▲
//!                           └──────── process_image_locally ───────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod export;
pub mod image;
pub mod raster;
pub mod source_cache;

pub use error::{RenderError, RenderResult};
pub use export::{encode, process_image_locally, transcode};
pub use image::{
    data_uri_size, format_file_size, load_image_from_bytes, load_image_from_data_uri,
    parse_data_uri, to_data_uri, EncodedImage, ImageFormat, TextureData,
};
pub use raster::{RasterOptions, StageRasterizer};
pub use source_cache::{CacheStats, SourceCache};
