use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::progress::RunId;

/// Result type alias for operations that may fail with [`VectorizeError`].
pub type VectorizeResult<T> = std::result::Result<T, VectorizeError>;

/// The input bytes could not be turned into a pixel buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes do not look like any supported raster format.
    #[error("Unsupported or unrecognized image format{}", detail_suffix(.detail))]
    UnsupportedFormat { detail: Option<String> },
    /// The format was recognized but the data could not be decoded.
    #[error("Image data is corrupt: {0}")]
    Malformed(#[source] image::ImageError),
    /// The image decoded to zero pixels.
    #[error("Image has zero dimensions ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    /// The decoder refused to allocate the image.
    #[error("Image exceeds decoder limits: {0}")]
    LimitsExceeded(#[source] image::ImageError),
    /// The blocking decode task did not finish.
    #[error("Decode task failed: {0}")]
    Task(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {detail}"),
        None => String::new(),
    }
}

/// The tracing engine failed or produced an unusable document.
#[derive(Debug, Error)]
pub enum TracingError {
    /// The engine reported an internal failure.
    #[error("Tracing engine failed: {0}")]
    Engine(String),
    /// The engine did not return within the configured timeout.
    #[error("Tracing timed out after {}ms", .elapsed.as_millis())]
    Timeout { elapsed: Duration },
    /// The engine returned text that is not a usable SVG document.
    #[error("Tracing produced an invalid document: {reason}")]
    InvalidDocument { reason: String },
    /// The blocking trace task panicked or was cancelled by the runtime.
    #[error("Trace task failed: {0}")]
    Task(String),
}

/// The input is larger than the configured maximum size.
#[derive(Debug, Error)]
#[error("Input of {actual} bytes exceeds the maximum of {limit} bytes")]
pub struct SizeLimitError {
    pub actual: u64,
    pub limit: u64,
}

/// Error types that can occur while vectorizing an image.
///
/// Decode, tracing and size-limit failures stay distinct so callers can show
/// a specific failure state. None of them carries a partial document.
#[derive(Debug, Error)]
pub enum VectorizeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Tracing(#[from] TracingError),
    #[error(transparent)]
    SizeLimit(#[from] SizeLimitError),
    /// A newer run started before this one finished; its result was dropped.
    #[error("Run {run} was superseded by a newer request")]
    Superseded { run: RunId },
    /// File system I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Input file not found at the specified path.
    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },
    /// A tracing profile file could not be parsed.
    #[error("Invalid tracing profile {}: {source}", path.display())]
    Profile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl VectorizeError {
    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            VectorizeError::Decode(_) => "decode",
            VectorizeError::Tracing(_) => "tracing",
            VectorizeError::SizeLimit(_) => "size-limit",
            VectorizeError::Superseded { .. } => "superseded",
            VectorizeError::Io(_) | VectorizeError::InputNotFound { .. } => "io",
            VectorizeError::Profile { .. } => "profile",
        }
    }
}
