use crate::config::TracingConfig;
use crate::error::TracingError;
use crate::normalize::PixelBuffer;

/// An engine that turns a pixel buffer into SVG text.
///
/// Implementations are called from a blocking worker thread and must not
/// mutate the buffer. The returned text is validated by the caller.
pub trait RasterVectorizer: Send + Sync {
    fn vectorize(&self, buffer: &PixelBuffer, config: &TracingConfig)
    -> Result<String, TracingError>;
}

#[cfg(feature = "vectorizer-vtracer")]
pub mod vtracer;
