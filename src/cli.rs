use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use logotrace::config::{DEFAULT_MAX_BYTES, DEFAULT_MAX_DIMENSION};
use logotrace::{Layering, TracingConfig};

/// Command line interface definition.
#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Maximum accepted input size in bytes
    #[arg(long = "max-bytes", global = true, env = logotrace::ENV_MAX_BYTES, default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: u64,
    /// Maximum accepted width or height of the decoded image
    #[arg(long = "max-dimension", global = true, default_value_t = DEFAULT_MAX_DIMENSION)]
    pub max_dimension: u32,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trace a raster image into an SVG document
    Vectorize(VectorizeCommand),
    /// Print format, size, dimensions and quantized palette of an image
    Probe(ProbeCommand),
}

#[derive(Args, Debug)]
pub struct VectorizeCommand {
    /// Input image path (PNG, JPEG, GIF, BMP or WebP)
    pub input: PathBuf,
    /// Output SVG path or directory (defaults to input name with `.svg`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// JSON file with tracing parameters; flags below override it
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,
    /// Give up on tracing after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,
    /// Hide the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,
    #[command(flatten)]
    pub tracing: TracingArgs,
}

#[derive(Args, Debug)]
pub struct ProbeCommand {
    /// Input image path
    pub input: PathBuf,
    /// Palette size used for the coverage report
    #[arg(long, default_value_t = 16)]
    pub colors: usize,
}

/// Overrides applied on top of the default or loaded profile.
#[derive(Args, Debug, Default)]
pub struct TracingArgs {
    /// Maximum number of palette colors
    #[arg(long)]
    pub colors: Option<usize>,
    /// Drop paths enclosing fewer pixels than this
    #[arg(long = "path-omit")]
    pub path_omit: Option<usize>,
    /// Palette entries covering less than this share of pixels are merged
    #[arg(long = "min-color-ratio")]
    pub min_color_ratio: Option<f32>,
    /// Selective blur radius in pixels
    #[arg(long = "blur-radius")]
    pub blur_radius: Option<u32>,
    /// Maximum color difference a blurred pixel may introduce
    #[arg(long = "blur-delta")]
    pub blur_delta: Option<u32>,
    /// Output layering
    #[arg(long, value_enum)]
    pub layering: Option<LayeringArg>,
    /// Outline every path with a stroke of this width
    #[arg(long = "stroke-width")]
    pub stroke_width: Option<f32>,
    /// Omit the explicit viewBox attribute
    #[arg(long = "no-viewbox")]
    pub no_viewbox: bool,
}

impl TracingArgs {
    /// Apply the flags that were given to `config`.
    pub fn apply(&self, mut config: TracingConfig) -> TracingConfig {
        if let Some(colors) = self.colors {
            config.color_count = colors;
        }
        if let Some(path_omit) = self.path_omit {
            config.path_omit = path_omit;
        }
        if let Some(ratio) = self.min_color_ratio {
            config.min_color_ratio = ratio;
        }
        if let Some(radius) = self.blur_radius {
            config.blur_radius = radius;
        }
        if let Some(delta) = self.blur_delta {
            config.blur_delta = delta;
        }
        if let Some(layering) = self.layering {
            config.layering = layering.into();
        }
        if let Some(width) = self.stroke_width {
            config.stroke_width = width;
        }
        if self.no_viewbox {
            config.viewbox = false;
        }
        config
    }
}

/// Layering of traced shapes.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LayeringArg {
    Flat,
    Stacked,
}

impl From<LayeringArg> for Layering {
    fn from(value: LayeringArg) -> Self {
        match value {
            LayeringArg::Flat => Layering::Flat,
            LayeringArg::Stacked => Layering::Stacked,
        }
    }
}
