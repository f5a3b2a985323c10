use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum accepted input size (10 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default cap on either side of a decoded image.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

/// How traced regions are layered in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layering {
    /// One flat layer of non-overlapping shapes, drawn in natural order.
    Flat,
    /// Shapes are stacked on top of each other.
    Stacked,
}

/// Parameters controlling quantization and path simplification.
///
/// The [`Default`] value is the logo/emblem profile: flat colors, tight
/// curve fitting, small specks dropped as noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Maximum number of palette colors after quantization.
    pub color_count: usize,
    /// Refinement passes over the palette assignment.
    pub quantization_passes: usize,
    /// Palette entries covering less than this share of pixels are merged away.
    pub min_color_ratio: f32,
    /// Selective blur radius in pixels, 0 disables the blur.
    pub blur_radius: u32,
    /// Blurred pixels differing from the source by more than this are reverted.
    pub blur_delta: u32,
    /// Straight line fitting tolerance.
    pub line_tolerance: f32,
    /// Curve fitting tolerance.
    pub curve_tolerance: f32,
    /// Paths enclosing fewer pixels than this are dropped.
    pub path_omit: usize,
    /// 0 keeps full precision, 1 rounds to whole units, n keeps n - 1 decimals.
    pub round_coords: u32,
    pub layering: Layering,
    /// Stroke width in output units, 0 means fill only.
    pub stroke_width: f32,
    /// Emit an explicit `viewBox` matching the source dimensions.
    pub viewbox: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            color_count: 16,
            quantization_passes: 3,
            min_color_ratio: 0.02,
            blur_radius: 0,
            blur_delta: 0,
            line_tolerance: 1.0,
            curve_tolerance: 1.0,
            path_omit: 8,
            round_coords: 1,
            layering: Layering::Flat,
            stroke_width: 0.0,
            viewbox: true,
        }
    }
}

impl TracingConfig {
    /// Set the palette size.
    pub fn with_color_count(mut self, color_count: usize) -> Self {
        self.color_count = color_count;
        self
    }

    /// Set the path omission threshold.
    pub fn with_path_omit(mut self, path_omit: usize) -> Self {
        self.path_omit = path_omit;
        self
    }

    /// Set the minimum color-area ratio.
    pub fn with_min_color_ratio(mut self, ratio: f32) -> Self {
        self.min_color_ratio = ratio;
        self
    }

    /// Enable selective blur with the given radius and delta.
    pub fn with_blur(mut self, radius: u32, delta: u32) -> Self {
        self.blur_radius = radius;
        self.blur_delta = delta;
        self
    }

    pub fn with_layering(mut self, layering: Layering) -> Self {
        self.layering = layering;
        self
    }

    pub fn with_stroke_width(mut self, stroke_width: f32) -> Self {
        self.stroke_width = stroke_width;
        self
    }

    pub fn with_viewbox(mut self, viewbox: bool) -> Self {
        self.viewbox = viewbox;
        self
    }

    /// Parse a profile from JSON. Missing fields fall back to the logo profile.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Number of decimal places kept in path coordinates, `None` for no rounding.
    pub fn path_precision(&self) -> Option<u32> {
        self.round_coords.checked_sub(1)
    }
}

/// Limits enforced on inputs before and during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLimits {
    /// Largest accepted encoded size in bytes.
    pub max_bytes: u64,
    /// Largest accepted width or height of the decoded image.
    pub max_dimension: u32,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl InputLimits {
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

/// Everything an orchestrator needs besides the engine itself.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub limits: InputLimits,
    pub tracing: TracingConfig,
    /// Upper bound on a single trace call, `None` waits indefinitely.
    pub trace_timeout: Option<Duration>,
}

impl PipelineSettings {
    pub fn with_limits(mut self, limits: InputLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn with_trace_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.trace_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_logo_profile() {
        let cfg = TracingConfig::default();
        assert_eq!(cfg.color_count, 16);
        assert_eq!(cfg.quantization_passes, 3);
        assert!((cfg.min_color_ratio - 0.02).abs() < f32::EPSILON);
        assert_eq!((cfg.blur_radius, cfg.blur_delta), (0, 0));
        assert_eq!(cfg.path_omit, 8);
        assert_eq!(cfg.round_coords, 1);
        assert_eq!(cfg.layering, Layering::Flat);
        assert_eq!(cfg.stroke_width, 0.0);
        assert!(cfg.viewbox);
    }

    #[test]
    fn round_coords_maps_to_decimal_places() {
        let mut cfg = TracingConfig::default();
        assert_eq!(cfg.path_precision(), Some(0));
        cfg.round_coords = 0;
        assert_eq!(cfg.path_precision(), None);
        cfg.round_coords = 3;
        assert_eq!(cfg.path_precision(), Some(2));
    }

    #[test]
    fn partial_profile_keeps_defaults() {
        let cfg = TracingConfig::from_json(r#"{ "color_count": 4, "layering": "stacked" }"#)
            .unwrap();
        assert_eq!(cfg.color_count, 4);
        assert_eq!(cfg.layering, Layering::Stacked);
        assert_eq!(cfg.path_omit, 8);
        assert!(cfg.viewbox);
    }

    #[test]
    fn malformed_profile_is_rejected() {
        assert!(TracingConfig::from_json("{ color_count: }").is_err());
    }

    #[test]
    fn default_limits_match_reference_deployment() {
        let limits = InputLimits::default();
        assert_eq!(limits.max_bytes, 10 * 1024 * 1024);
        assert_eq!(limits.max_dimension, DEFAULT_MAX_DIMENSION);
    }
}
