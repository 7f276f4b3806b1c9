//! Command-line arguments and studio configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use pixmorph_core::{CoreError, CoreResult, Dimension, OutputFormat, StageConfig};

/// Default request timeout for the image services, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Command-line arguments for `pixmorph`.
#[derive(Debug, Clone, Parser)]
#[command(name = "pixmorph")]
#[command(about = "PixMorph image studio: layer compositor and single-image editor")]
#[command(version)]
pub struct CliArgs {
    /// AI edit endpoint URL
    #[arg(long, env = "PIXMORPH_AI_URL", global = true)]
    pub ai_url: Option<String>,

    /// API key sent as a bearer token to the AI endpoint
    #[arg(long, env = "PIXMORPH_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Background removal endpoint URL
    #[arg(long, env = "PIXMORPH_BG_URL", global = true)]
    pub bg_url: Option<String>,

    /// Request timeout in seconds for the image services
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout: u64,

    /// Stage width in stage units
    #[arg(long, default_value = "800", global = true)]
    pub stage_width: f32,

    /// Stage height in stage units
    #[arg(long, default_value = "600", global = true)]
    pub stage_height: f32,

    /// Pixel ratio for composition export
    #[arg(long, default_value = "2.0", global = true)]
    pub export_ratio: f32,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Headless studio operations.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resize and convert one image locally
    Resize(ResizeArgs),
    /// Edit one image with the AI service
    AiEdit(AiEditArgs),
    /// Stack images into a composition and export it
    Compose(ComposeArgs),
}

/// Arguments for `resize`.
#[derive(Debug, Clone, Args)]
pub struct ResizeArgs {
    /// Input image
    pub input: PathBuf,
    /// Target width; the height follows when the aspect ratio is locked
    #[arg(long)]
    pub width: Option<u32>,
    /// Target height; the width follows when the aspect ratio is locked
    #[arg(long)]
    pub height: Option<u32>,
    /// Allow width and height to change independently
    #[arg(long)]
    pub unlock_aspect: bool,
    /// Output quality from 0 to 1
    #[arg(long, default_value = "0.9")]
    pub quality: f32,
    /// Output format (png, jpg, webp, gif, svg)
    #[arg(long, default_value = "jpg")]
    pub format: OutputFormat,
    /// Directory for the result
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

impl ResizeArgs {
    /// Side edits to apply, in order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] when both sides are given while
    /// the aspect ratio is locked, since the second edit would overwrite the
    /// first.
    pub fn dimension_edits(&self) -> CoreResult<Vec<(Dimension, u32)>> {
        match (self.width, self.height) {
            (Some(_), Some(_)) if !self.unlock_aspect => Err(CoreError::InvalidState(
                "--width and --height together need --unlock-aspect".to_string(),
            )),
            (width, height) => Ok(width
                .map(|w| (Dimension::Width, w))
                .into_iter()
                .chain(height.map(|h| (Dimension::Height, h)))
                .collect()),
        }
    }
}

/// Arguments for `ai-edit`.
#[derive(Debug, Clone, Args)]
pub struct AiEditArgs {
    /// Input image
    pub input: PathBuf,
    /// Instruction for the AI
    #[arg(long)]
    pub prompt: String,
    /// Output format (png, jpg, webp, gif, svg)
    #[arg(long, default_value = "jpg")]
    pub format: OutputFormat,
    /// Directory for the result
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Arguments for `compose`.
#[derive(Debug, Clone, Args)]
pub struct ComposeArgs {
    /// Images, bottom first
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Chat messages applied in order after the images are added
    #[arg(long = "say")]
    pub messages: Vec<String>,
    /// Directory for the result
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
    /// Also write a JSON snapshot of the layer store
    #[arg(long)]
    pub snapshot: bool,
}

/// Studio configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    /// Composition stage.
    pub stage: StageConfig,
    /// AI edit endpoint URL.
    pub ai_url: Option<String>,
    /// API key for the AI endpoint.
    pub api_key: Option<String>,
    /// Background removal endpoint URL.
    pub bg_url: Option<String>,
    /// Request timeout for the image services.
    pub timeout: Duration,
    /// Pixel ratio for composition export.
    pub export_pixel_ratio: f32,
    /// Pixel ratio for the AI input capture.
    pub capture_pixel_ratio: f32,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StudioConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: StageConfig::default(),
            ai_url: None,
            api_key: None,
            bg_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            export_pixel_ratio: 2.0,
            capture_pixel_ratio: 1.0,
        }
    }
}

impl From<&CliArgs> for StudioConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            stage: StageConfig {
                width: args.stage_width,
                height: args.stage_height,
                ..StageConfig::default()
            },
            ai_url: args.ai_url.clone(),
            api_key: args.api_key.clone(),
            bg_url: args.bg_url.clone(),
            timeout: Duration::from_secs(args.timeout),
            export_pixel_ratio: args.export_ratio,
            capture_pixel_ratio: 1.0,
        }
    }
}
