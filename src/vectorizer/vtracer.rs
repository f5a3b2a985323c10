use image::RgbaImage;
use tracing::debug;
use visioncortex::{PathSimplifyMode, PointF64};
use vtracer::{ColorImage, ColorMode, Config, Hierarchical, SvgFile, convert};

use crate::config::{Layering, TracingConfig};
use crate::document::SvgWriter;
use crate::error::TracingError;
use crate::normalize::PixelBuffer;
use crate::preprocess::{apply_steps, steps_from_config};

use super::RasterVectorizer;

const COLOR_PRECISION: i32 = 8;
const LAYER_DIFFERENCE: i32 = 1;
const CORNER_THRESHOLD: i32 = 60;
const MAX_ITERATIONS: usize = 10;
const MIN_LENGTH_THRESHOLD: f64 = 3.5;
const MAX_LENGTH_THRESHOLD: f64 = 10.0;
const SPLICE_PER_TOLERANCE: f64 = 45.0;

/// VTracer-based SVG vectorizer.
///
/// The palette is reduced by [`crate::preprocess`] first, so VTracer only
/// has to cluster the already-flat colors.
#[derive(Debug, Clone, Copy, Default)]
pub struct VtracerVectorizer;

impl RasterVectorizer for VtracerVectorizer {
    fn vectorize(
        &self,
        buffer: &PixelBuffer,
        config: &TracingConfig,
    ) -> Result<String, TracingError> {
        trace_to_svg_string(buffer, config)
    }
}

/// Preprocess, trace and serialize a pixel buffer.
pub fn trace_to_svg_string(
    buffer: &PixelBuffer,
    config: &TracingConfig,
) -> Result<String, TracingError> {
    let steps = steps_from_config(config);
    let prepared = apply_steps(buffer.to_rgba_image(), &steps);
    debug!(steps = steps.len(), "preprocessed pixel buffer");

    let svg_file = trace(to_color_image(&prepared), config)?;
    debug!(paths = svg_file.paths.len(), "vtracer finished");
    Ok(write_svg(&svg_file, buffer.dimensions(), config))
}

/// Trace a ColorImage into an SVG using VTracer.
pub fn trace(img: ColorImage, config: &TracingConfig) -> Result<SvgFile, TracingError> {
    convert(img, build_config(config)).map_err(TracingError::Engine)
}

/// Map the tracing profile onto VTracer's knobs.
pub fn build_config(config: &TracingConfig) -> Config {
    let hierarchical = match config.layering {
        Layering::Flat => Hierarchical::Cutout,
        Layering::Stacked => Hierarchical::Stacked,
    };
    let length_threshold = (MIN_LENGTH_THRESHOLD + f64::from(config.line_tolerance))
        .clamp(MIN_LENGTH_THRESHOLD, MAX_LENGTH_THRESHOLD);
    let splice_threshold =
        (SPLICE_PER_TOLERANCE * f64::from(config.curve_tolerance)).round().clamp(0.0, 180.0) as i32;

    Config {
        color_mode: ColorMode::Color,
        hierarchical,
        mode: PathSimplifyMode::Spline,
        filter_speckle: speckle_side(config.path_omit),
        color_precision: COLOR_PRECISION,
        layer_difference: LAYER_DIFFERENCE,
        corner_threshold: CORNER_THRESHOLD,
        length_threshold,
        max_iterations: MAX_ITERATIONS,
        splice_threshold,
        path_precision: config.path_precision(),
    }
}

/// VTracer filters speckles by the side of a square, the profile by area.
pub fn speckle_side(path_omit: usize) -> usize {
    (path_omit as f64).sqrt().ceil() as usize
}

pub fn to_color_image(image: &RgbaImage) -> ColorImage {
    let (w, h) = image.dimensions();
    ColorImage {
        pixels: image.as_raw().clone(),
        width: w as usize,
        height: h as usize,
    }
}

fn write_svg(svg_file: &SvgFile, (width, height): (u32, u32), config: &TracingConfig) -> String {
    let mut writer = SvgWriter::new(width, height, config);
    for path in &svg_file.paths {
        let (d, offset) = path
            .path
            .to_svg_string(true, PointF64::default(), config.path_precision());
        writer.push_path(&d, &path.color.to_hex_string(), (offset.x, offset.y));
    }
    writer.finish()
}
