//! Decode an encoded image into a canonical RGBA pixel buffer.

use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageError, ImageReader, RgbaImage};
use tracing::debug;

use crate::config::InputLimits;
use crate::error::DecodeError;
use crate::input::{EncodedImage, RasterFormat};

/// A decoded grid of RGBA8 pixels.
///
/// Every constructor upholds `data.len() == width * height * 4` with non-zero
/// dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer from raw RGBA bytes, `None` if the length or dimensions are off.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Take ownership of an RGBA image, `None` if it has no pixels.
    pub fn from_rgba_image(image: RgbaImage) -> Option<Self> {
        let (width, height) = image.dimensions();
        Self::from_raw(width, height, image.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw RGBA bytes in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterate over pixels as `[r, g, b, a]`.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        self.clone().into_rgba_image()
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        // Length invariant guarantees the conversion.
        RgbaImage::from_raw(self.width, self.height, self.data)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

/// An image decoded at its natural size, not yet drawn onto a pixel surface.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
    format: RasterFormat,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// The format the bytes were actually decoded as.
    pub fn format(&self) -> RasterFormat {
        self.format
    }
}

/// Turns encoded images into pixel buffers.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    limits: InputLimits,
}

impl Normalizer {
    pub fn new(limits: InputLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &InputLimits {
        &self.limits
    }

    /// Decode and rasterize in one step.
    pub fn normalize(&self, encoded: &EncodedImage) -> Result<PixelBuffer, DecodeError> {
        let decoded = self.decode(encoded)?;
        self.rasterize(decoded)
    }

    /// Decode the bytes at their natural size, honoring EXIF orientation.
    pub fn decode(&self, encoded: &EncodedImage) -> Result<DecodedImage, DecodeError> {
        let format = resolve_format(encoded)?;

        let mut reader =
            ImageReader::with_format(Cursor::new(encoded.bytes()), format.image_format());
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.limits.max_dimension);
        limits.max_image_height = Some(self.limits.max_dimension);
        reader.limits(limits);

        let mut decoder = reader.into_decoder().map_err(classify_image_error)?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut image = DynamicImage::from_decoder(decoder).map_err(classify_image_error)?;
        image.apply_orientation(orientation);

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage { width, height });
        }
        debug!(%format, width, height, ?orientation, "decoded image");
        Ok(DecodedImage { image, format })
    }

    /// Draw the decoded image onto a fresh RGBA surface of the same size and read it back.
    pub fn rasterize(&self, decoded: DecodedImage) -> Result<PixelBuffer, DecodeError> {
        let (width, height) = decoded.dimensions();
        let surface = decoded.image.into_rgba8();
        PixelBuffer::from_rgba_image(surface).ok_or(DecodeError::EmptyImage { width, height })
    }
}

/// Content wins over the declared format; bytes in a known but unsupported format are rejected.
fn resolve_format(encoded: &EncodedImage) -> Result<RasterFormat, DecodeError> {
    match image::guess_format(encoded.bytes()) {
        Ok(guessed) => {
            RasterFormat::from_image_format(guessed).ok_or_else(|| DecodeError::UnsupportedFormat {
                detail: Some(format!("{guessed:?} is not supported")),
            })
        }
        Err(_) => Ok(encoded.format()),
    }
}

fn classify_image_error(err: ImageError) -> DecodeError {
    match err {
        ImageError::Limits(_) => DecodeError::LimitsExceeded(err),
        ImageError::Unsupported(ref unsupported) => DecodeError::UnsupportedFormat {
            detail: Some(unsupported.to_string()),
        },
        other => DecodeError::Malformed(other),
    }
}
