//! Input boundary: size and format gating for user-supplied images.
//!
//! Oversized or unrecognized inputs are rejected here, before any decoder
//! runs. The normalizer still fails safely on anything that slips through
//! [`EncodedImage::new`].

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;
use tracing::debug;

use crate::config::InputLimits;
use crate::error::{DecodeError, SizeLimitError, VectorizeError, VectorizeResult};

/// Raster formats accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl RasterFormat {
    pub const ALL: [RasterFormat; 5] = [
        RasterFormat::Jpeg,
        RasterFormat::Png,
        RasterFormat::Gif,
        RasterFormat::Bmp,
        RasterFormat::WebP,
    ];

    /// Map an `image` format onto the supported set.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(RasterFormat::Jpeg),
            ImageFormat::Png => Some(RasterFormat::Png),
            ImageFormat::Gif => Some(RasterFormat::Gif),
            ImageFormat::Bmp => Some(RasterFormat::Bmp),
            ImageFormat::WebP => Some(RasterFormat::WebP),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            RasterFormat::Jpeg => ImageFormat::Jpeg,
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Gif => ImageFormat::Gif,
            RasterFormat::Bmp => ImageFormat::Bmp,
            RasterFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Resolve a MIME type such as `image/png`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        ImageFormat::from_mime_type(mime).and_then(Self::from_image_format)
    }

    /// Resolve a file extension such as `jpg` (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        ImageFormat::from_extension(ext).and_then(Self::from_image_format)
    }

    /// Detect the format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        image::guess_format(bytes)
            .ok()
            .and_then(Self::from_image_format)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Jpeg => "image/jpeg",
            RasterFormat::Png => "image/png",
            RasterFormat::Gif => "image/gif",
            RasterFormat::Bmp => "image/bmp",
            RasterFormat::WebP => "image/webp",
        }
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RasterFormat::Jpeg => "JPEG",
            RasterFormat::Png => "PNG",
            RasterFormat::Gif => "GIF",
            RasterFormat::Bmp => "BMP",
            RasterFormat::WebP => "WEBP",
        };
        f.write_str(name)
    }
}

/// An encoded raster image as supplied by the user. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    format: RasterFormat,
}

impl EncodedImage {
    /// Wrap bytes with a declared format without any checks.
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: RasterFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The declared or sniffed format.
    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reject inputs larger than `limits.max_bytes`.
pub fn check_size(size: u64, limits: &InputLimits) -> Result<(), SizeLimitError> {
    if size > limits.max_bytes {
        return Err(SizeLimitError {
            actual: size,
            limit: limits.max_bytes,
        });
    }
    Ok(())
}

/// Gate raw bytes into an [`EncodedImage`].
///
/// The size check runs first. The format is always sniffed from the bytes; a
/// declared format only shows up in the log when it disagrees. Bytes that
/// match no known signature are rejected here, before any decoder sees them.
pub fn accept_bytes(
    bytes: impl Into<Arc<[u8]>>,
    declared: Option<RasterFormat>,
    limits: &InputLimits,
) -> VectorizeResult<EncodedImage> {
    let bytes: Arc<[u8]> = bytes.into();
    check_size(bytes.len() as u64, limits)?;

    let format = match image::guess_format(&bytes) {
        Ok(guessed) => RasterFormat::from_image_format(guessed).ok_or_else(|| {
            DecodeError::UnsupportedFormat {
                detail: Some(format!("{guessed:?} is not supported")),
            }
        })?,
        Err(_) => return Err(DecodeError::UnsupportedFormat { detail: None }.into()),
    };
    if let Some(declared) = declared.filter(|declared| *declared != format) {
        debug!(%declared, sniffed = %format, "declared format ignored");
    }

    debug!(bytes = bytes.len(), %format, "accepted input");
    Ok(EncodedImage::new(bytes, format))
}

/// Gate a file on disk. The size is checked from metadata before reading.
pub fn accept_path(path: &Path, limits: &InputLimits) -> VectorizeResult<EncodedImage> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(VectorizeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };
    check_size(metadata.len(), limits)?;

    let declared = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(RasterFormat::from_extension);
    let bytes = fs::read(path)?;
    accept_bytes(bytes, declared, limits)
}
