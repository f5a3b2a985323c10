//! Raster image to SVG vectorization for logos and emblems.
//!
//! An [`EncodedImage`] is gated by [`accept_bytes`] or [`accept_path`],
//! decoded into a [`PixelBuffer`] by the [`Normalizer`], reduced to a small
//! flat palette and traced into a [`VectorDocument`]. The [`Orchestrator`]
//! sequences these steps and publishes [`RunEvent`]s as it goes.

pub mod config;
pub mod document;
pub mod error;
pub mod input;
pub mod invoker;
pub mod normalize;
pub mod orchestrator;
pub mod preprocess;
pub mod progress;
pub mod vectorizer;

pub use config::{InputLimits, Layering, PipelineSettings, TracingConfig};
pub use document::{SvgWriter, VectorDocument, ViewBox};
pub use error::{DecodeError, SizeLimitError, TracingError, VectorizeError, VectorizeResult};
pub use input::{EncodedImage, RasterFormat, accept_bytes, accept_path};
pub use invoker::TracingInvoker;
pub use normalize::{DecodedImage, Normalizer, PixelBuffer};
pub use orchestrator::{CompletionHandler, Orchestrator};
pub use preprocess::{Palette, PreprocessStep};
pub use progress::{Milestone, RunEvent, RunId, RunState};
pub use vectorizer::RasterVectorizer;
#[cfg(feature = "vectorizer-vtracer")]
pub use vectorizer::vtracer::{VtracerVectorizer, trace_to_svg_string};

/// Environment variable overriding the maximum accepted input size.
pub const ENV_MAX_BYTES: &str = "LOGOTRACE_MAX_BYTES";
